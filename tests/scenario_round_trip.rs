//! ---
//! psd_section: "15-testing-qa-runbook"
//! psd_subsection: "integration-tests"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Scenario lifecycle across the server, the mirror and the readers."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use psd_data_access::table::parse_timestamp;
use psd_data_access::{
    Artifact, ColumnKey, DataAccess, DataStore, IndexValue, SshDataAccess, Table, SSH_BACKEND,
};
use psd_scenario::{Analyze, Listing, SCENARIO_LIST};
use psd_storage::{FileSystem, LocalFs, LocalShell, SshFs, UnionFs};
use tempfile::{tempdir, TempDir};

const LIST: &str = "\
id,plan,name,state,grid_model,base_demand,base_hydro,base_solar,base_wind,start_date,end_date,interval,infeasibilities
824,test,hourly,analyze,usa_tamu,vJan2021,vJan2021,vJan2021,vJan2021,2016-01-01 00:00:00,2016-01-01 03:00:00,1H,0:10
";

struct Setup {
    _dir: TempDir,
    server_root: PathBuf,
    access: SshDataAccess,
}

fn write(root: &Path, path: &str, data: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, data).unwrap();
}

fn setup() -> Setup {
    let dir = tempdir().unwrap();
    let server_root = dir.path().join("pcm");
    write(&server_root, SCENARIO_LIST, LIST);
    write(
        &server_root,
        "raw/usa_tamu/demand_vJan2021.csv",
        "UTC,301\n2016-01-01 00:00:00,200\n2016-01-01 01:00:00,200\n2016-01-01 02:00:00,200\n2016-01-01 03:00:00,200\n",
    );

    let remote = Arc::new(
        SshFs::connect(Arc::new(LocalShell::new()), server_root.to_string_lossy()).unwrap(),
    );
    let local: Arc<dyn FileSystem> = Arc::new(LocalFs::open(dir.path().join("mirror")).unwrap());
    let mut fs = UnionFs::new();
    fs.add(SSH_BACKEND, remote.clone(), 3, true);
    let store = DataStore::new(remote.root().to_owned(), fs, local);
    Setup {
        _dir: dir,
        server_root,
        access: SshDataAccess::from_store(store, Some(remote)),
    }
}

fn listing(access: &SshDataAccess) -> Listing {
    if !access.store().local().exists(SCENARIO_LIST).unwrap() {
        access.copy_from(SCENARIO_LIST, None).unwrap();
    }
    Listing::from_csv(&access.store().local().read_bytes(SCENARIO_LIST).unwrap()).unwrap()
}

#[test]
fn infeasible_hour_is_reduced_after_fetch() {
    let setup = setup();
    let info = listing(&setup.access).scenario("824").unwrap();
    let analyze = Analyze::new(info, &setup.access, "data/output");

    let demand = analyze.get_demand(false).unwrap();
    assert_eq!(demand.column(&ColumnKey::Int(301)).unwrap(), [180.0, 200.0, 200.0, 200.0]);
    assert_eq!(
        demand.index()[0].as_time(),
        parse_timestamp("2016-01-01 00:00:00")
    );
}

#[test]
fn outputs_written_to_server_are_read_back() {
    let setup = setup();
    let info = listing(&setup.access).scenario("824").unwrap();
    let start = info.start_date;
    let pg = Table::new(
        Some("UTC".into()),
        (0..4)
            .map(|h| IndexValue::Time(start + chrono::Duration::hours(h)))
            .collect(),
        vec![ColumnKey::Int(11), ColumnKey::Int(12)],
        vec![vec![1.0, 2.0]; 4],
    )
    .unwrap();
    setup
        .access
        .write("data/output/824_PG.pkl", &Artifact::Table(pg.clone()), false)
        .unwrap();
    assert!(setup.server_root.join("data/output/824_PG.pkl").exists());

    let analyze = Analyze::new(info, &setup.access, "data/output");
    assert_eq!(analyze.get_pg().unwrap(), pg);
}

#[test]
fn edited_listing_is_pushed_back() {
    let setup = setup();
    listing(&setup.access);
    let updated = format!(
        "{LIST}825,test,copy,create,usa_tamu,vJan2021,vJan2021,vJan2021,vJan2021,2016-01-01 00:00:00,2016-01-01 03:00:00,1H,No\n"
    );
    setup
        .access
        .store()
        .local()
        .write_bytes(SCENARIO_LIST, updated.as_bytes())
        .unwrap();

    let checksum = setup.access.checksum(SCENARIO_LIST).unwrap();
    setup
        .access
        .push(SCENARIO_LIST, &checksum, SCENARIO_LIST)
        .unwrap();

    let on_server = fs::read_to_string(setup.server_root.join(SCENARIO_LIST)).unwrap();
    assert_eq!(on_server, updated);
    let reread = Listing::from_csv(on_server.as_bytes()).unwrap();
    assert_eq!(reread.ids().collect::<Vec<_>>(), ["824", "825"]);
}
