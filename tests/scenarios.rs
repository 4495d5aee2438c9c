//! End-to-end planner scenarios.
//!
//! Each test builds a throwaway environment: an embedded live database
//! file with the externally-owned schema, an in-memory planning store,
//! and a planner driven tick-by-tick. Robots are simulated through the
//! planner handle, exactly like the RPC layer drives it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use tempfile::TempDir;

use chargepal_fleet::application::requests::JobDetails;
use chargepal_fleet::application::services::Reconciler;
use chargepal_fleet::application::{Planner, PlannerConfig, PlannerHandle, StationPicker};
use chargepal_fleet::domain::{BookingState, JobState, JobType};
use chargepal_fleet::infrastructure::database::plan;
use chargepal_fleet::shared::time::{datetime_str, now};
use chargepal_fleet::{init_plan_database, LiveStore, LiveStoreConfig};

/// Initial world: robots at their base stations, carts at waiting
/// stations unless placed explicitly.
struct Config {
    robot_count: usize,
    cart_count: usize,
    ads_count: usize,
    bcs_count: usize,
    /// Overrides of the default cart placement, by cart name.
    cart_locations: BTreeMap<String, String>,
}

impl Config {
    fn all_one() -> Self {
        Self {
            robot_count: 1,
            cart_count: 1,
            ads_count: 1,
            bcs_count: 1,
            cart_locations: BTreeMap::new(),
        }
    }
}

struct Environment {
    planner: Planner,
    handle: PlannerHandle,
    live: Arc<LiveStore>,
    live_conn: DatabaseConnection,
    plan_db: DatabaseConnection,
    picker: Arc<StationPicker>,
    _dir: TempDir,
}

async fn execute(conn: &DatabaseConnection, sql: &str) {
    conn.execute(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
        .await
        .unwrap_or_else(|e| panic!("SQL failed: {e}\n{sql}"));
}

fn names(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("{prefix}{n}")).collect()
}

fn env_value(entries: &[String]) -> String {
    let quoted: Vec<String> = entries.iter().map(|e| format!("'{e}'")).collect();
    format!("[{}]", quoted.join(", "))
}

async fn setup(config: Config) -> Environment {
    let dir = tempfile::tempdir().expect("temp dir");
    let ldb_path = dir.path().join("ldb.db");
    let live_conn = Database::connect(format!("sqlite://{}?mode=rwc", ldb_path.display()))
        .await
        .expect("live db");

    execute(
        &live_conn,
        "CREATE TABLE robot_info (
            name TEXT PRIMARY KEY, robot_location TEXT, current_job TEXT,
            ongoing_action TEXT, previous_action TEXT, cart_on_robot TEXT,
            job_status TEXT, availability INTEGER, robot_charge REAL,
            error_count INTEGER)",
    )
    .await;
    execute(
        &live_conn,
        "CREATE TABLE cart_info (
            name TEXT PRIMARY KEY, cart_location TEXT, robot_on_cart TEXT,
            plugged INTEGER, action_state TEXT, error_count INTEGER)",
    )
    .await;
    execute(
        &live_conn,
        "CREATE TABLE env_info (name TEXT PRIMARY KEY, value TEXT, count INTEGER)",
    )
    .await;
    execute(
        &live_conn,
        "CREATE TABLE orders_in (
            charging_session_id INTEGER PRIMARY KEY, drop_location TEXT,
            charging_session_status TEXT, drop_date_time TEXT,
            pick_up_date_time TEXT, plugintime_calculated TEXT,
            booking_date_time_dev TEXT, last_change TEXT,
            Actual_Drop_SOC INTEGER, Actual_Target_SOC INTEGER,
            Actual_plugintime_calculated TEXT, Actual_BEV_Drop_Time TEXT,
            Actual_BEV_Pickup_Time TEXT, BEV_slot_planned TEXT,
            bev_Port_Location TEXT)",
    )
    .await;
    execute(
        &live_conn,
        "CREATE TABLE CAN_MSG_RX_LIVE (
            Battry_ID TEXT PRIMARY KEY, State_bat_mod TEXT,
            Mode_Bat_only INTEGER, Flag_Modus TEXT,
            AC_Car_inlet_UNLOCKED INTEGER, AC_Charger_inlet_UNLOCKED INTEGER,
            Bat_State_actual TEXT, last_change TEXT)",
    )
    .await;

    let robot_names = names("ChargePal", config.robot_count);
    let rbs_names = names("RBS_", config.robot_count);
    let cart_names = names("BAT_", config.cart_count);
    let bws_names = names("BWS_", config.cart_count);
    let ads_names = names("ADS_", config.ads_count);
    let bcs_names = names("BCS_", config.bcs_count);

    for (robot, rbs) in robot_names.iter().zip(&rbs_names) {
        execute(
            &live_conn,
            &format!(
                "INSERT INTO robot_info VALUES ('{robot}', '{rbs}', NULL, NULL, NULL, \
                 NULL, NULL, 1, 100.0, 0)"
            ),
        )
        .await;
    }
    for (cart, bws) in cart_names.iter().zip(&bws_names) {
        let location = config
            .cart_locations
            .get(cart)
            .cloned()
            .unwrap_or_else(|| bws.clone());
        execute(
            &live_conn,
            &format!("INSERT INTO cart_info VALUES ('{cart}', '{location}', NULL, 0, NULL, 0)"),
        )
        .await;
    }
    for (key, entries) in [
        ("robot_names", &robot_names),
        ("cart_names", &cart_names),
        ("rbs_names", &rbs_names),
        ("bws_names", &bws_names),
        ("ads_names", &ads_names),
        ("bcs_names", &bcs_names),
    ] {
        execute(
            &live_conn,
            &format!(
                "INSERT INTO env_info VALUES ('{key}', '{}', {})",
                env_value(entries).replace('\'', "''"),
                entries.len()
            ),
        )
        .await;
    }

    let live = Arc::new(
        LiveStore::connect(&LiveStoreConfig {
            mysql_url: None,
            sqlite_path: ldb_path,
        })
        .await
        .expect("live store"),
    );

    let plan_db = init_plan_database("sqlite::memory:").await.expect("plan db");
    let env_infos = live.fetch_env_infos().await.expect("env infos");
    let robot_infos = live
        .fetch_by_first_header("robot_info", &["name", "robot_location"])
        .await
        .expect("robot infos");
    let cart_infos = live
        .fetch_by_first_header("cart_info", &["name", "cart_location"])
        .await
        .expect("cart infos");
    plan::seed_from_live(&plan_db, &env_infos, &robot_infos, &cart_infos)
        .await
        .expect("seed");

    let picker = Arc::new(StationPicker::new());
    let (planner, handle) = Planner::new(
        live.clone(),
        plan_db.clone(),
        picker.clone(),
        PlannerConfig::default(),
    );

    Environment {
        planner,
        handle,
        live,
        live_conn,
        plan_db,
        picker,
        _dir: dir,
    }
}

impl Environment {
    async fn tick(&mut self) {
        self.planner.tick().await.expect("tick");
    }

    /// Insert a checked-in booking for `drop_location`, due now.
    async fn create_booking(&self, id: i64, drop_location: &str) {
        self.create_booking_with_status(id, drop_location, BookingState::CheckedIn)
            .await;
    }

    async fn create_booking_with_status(&self, id: i64, drop_location: &str, status: BookingState) {
        let drop = datetime_str(now() - Duration::minutes(2));
        let pickup = datetime_str(now() + Duration::hours(2));
        let change = datetime_str(now());
        execute(
            &self.live_conn,
            &format!(
                "INSERT INTO orders_in VALUES ({id}, '{drop_location}', '{status}', \
                 '{drop}', '{pickup}', '1', '{drop}', '{change}', 20, 80, '0', \
                 NULL, NULL, '1', 'left')",
                status = status.as_str(),
            ),
        )
        .await;
    }

    async fn set_booking_status(&self, id: i64, status: BookingState) {
        self.live
            .update_session_status(id, status)
            .await
            .expect("status update");
    }

    /// Tick until `robot` receives a job, asserting its type.
    async fn wait_for_job(&mut self, robot: &str, expected: Option<JobType>) -> JobDetails {
        for _ in 0..25 {
            let details = self.handle.fetch_job(robot);
            if !details.job_type.is_empty() {
                if let Some(expected) = expected {
                    assert_eq!(
                        details.job_type,
                        expected.as_str(),
                        "unexpected job for {robot}: {details:?}"
                    );
                }
                return details;
            }
            self.tick().await;
        }
        panic!("{robot} never received a job");
    }

    fn report(&self, robot: &str, job_type: &str, status: &str) {
        assert!(
            self.handle.update_job(robot, job_type, status).expect("update"),
            "{robot} had no job to report on"
        );
    }

    async fn live_status(&self, id: i64) -> String {
        self.live
            .get_session_statuses()
            .await
            .expect("statuses")
            .into_iter()
            .find(|(session, _)| *session == id)
            .map(|(_, status)| status)
            .expect("booking present")
    }
}

// ── Scenarios ───────────────────────────────────────────────────

/// S1: one robot, one cart, one adapter station; full delivery,
/// self-recharge, and recharge cycle.
#[tokio::test]
async fn single_robot_full_cycle() {
    let mut env = setup(Config::all_one()).await;
    env.create_booking(1, "ADS_1").await;

    let job = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    assert_eq!(job.target_station, "ADS_1");
    assert_eq!(job.cart, "BAT_1");
    assert_eq!(job.source_station, "BWS_1");
    env.report("ChargePal1", "BRING_CHARGER", "Success");

    let job = env.wait_for_job("ChargePal1", Some(JobType::RechargeSelf)).await;
    assert_eq!(job.target_station, "RBS_1");
    env.report("ChargePal1", "RECHARGE_SELF", "Success");

    // Vehicle finished charging: the retrieve job upgrades to a
    // recharge at the free BCS.
    env.set_booking_status(1, BookingState::Ready).await;
    let job = env
        .wait_for_job("ChargePal1", Some(JobType::RechargeCharger))
        .await;
    assert_eq!(job.target_station, "BCS_1");
    assert_eq!(job.cart, "BAT_1");
    env.report("ChargePal1", "RECHARGE_CHARGER", "Success");

    let job = env.wait_for_job("ChargePal1", Some(JobType::RechargeSelf)).await;
    assert_eq!(job.target_station, "RBS_1");

    // The retrieve chain completed: the cart is no longer bound.
    let cart = plan::cart(&env.plan_db, "BAT_1").await.expect("cart");
    assert_eq!(cart.booking_id, None);
    assert_eq!(cart.location, "BCS_1");
}

/// S2: a failed delivery frees the cart and the booking is re-scheduled.
#[tokio::test]
async fn failure_recovery() {
    let mut env = setup(Config::all_one()).await;
    env.create_booking(1, "ADS_1").await;

    let first = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    env.report("ChargePal1", "BRING_CHARGER", "Failure");
    env.tick().await;

    let cart = plan::cart(&env.plan_db, &first.cart).await.expect("cart");
    assert!(cart.available, "failed delivery must free the cart");
    assert_eq!(cart.booking_id, None);

    // The booking rewinds to checked_in and produces a fresh job.
    let second = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    assert_ne!(first.job_id, second.job_id);
    env.report("ChargePal1", "BRING_CHARGER", "Success");
    env.wait_for_job("ChargePal1", Some(JobType::RechargeSelf)).await;
}

/// S3: two simultaneous bookings bind two distinct robots and carts
/// within one tick.
#[tokio::test]
async fn two_robots_two_bookings_in_parallel() {
    let mut env = setup(Config {
        robot_count: 2,
        cart_count: 3,
        ads_count: 2,
        bcs_count: 2,
        cart_locations: BTreeMap::new(),
    })
    .await;
    env.create_booking(1, "ADS_1").await;
    env.create_booking(2, "ADS_2").await;
    env.tick().await;

    let job1 = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    let job2 = env.wait_for_job("ChargePal2", Some(JobType::BringCharger)).await;
    assert_ne!(job1.cart, job2.cart, "each booking needs its own cart");
    assert_ne!(job1.target_station, job2.target_station);
}

/// S4: canceling a booking mid-flight cancels its jobs and frees every
/// resource within one tick.
#[tokio::test]
async fn cancel_mid_flight() {
    let mut env = setup(Config::all_one()).await;
    env.create_booking(7, "ADS_1").await;

    let job = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    env.set_booking_status(7, BookingState::Canceled).await;
    env.tick().await;
    env.tick().await;

    let jobs = plan::jobs(&env.plan_db).await.expect("jobs");
    let canceled = jobs.iter().find(|j| j.id == job.job_id).expect("job row");
    assert_eq!(canceled.job_state(), Some(JobState::Canceled));
    assert!(!canceled.currently_assigned);

    let robot = plan::robot(&env.plan_db, "ChargePal1").await.expect("robot");
    assert!(robot.available);
    let cart = plan::cart(&env.plan_db, "BAT_1").await.expect("cart");
    assert!(cart.available);
    assert_eq!(cart.booking_id, None);
    let station = plan::station(&env.plan_db, "ADS_1").await.expect("station");
    assert_eq!(station.reservation, None);
    assert!(station.available);
}

/// S5: the plug-in handshake answers false, false, true across the
/// three calls, pushing `pending` to the live store on the first.
#[tokio::test]
async fn plug_in_handshake_progression() {
    let mut env = setup(Config::all_one()).await;
    env.create_booking(3, "ADS_1").await;

    env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    assert_eq!(env.live_status(3).await, "booked");

    assert!(!env.handle.handshake_plug_in("ChargePal1"));
    env.tick().await;
    assert_eq!(env.live_status(3).await, "pending");

    // Vehicle side not reconciled yet: still not ready.
    assert!(!env.handle.handshake_plug_in("ChargePal1"));
    env.tick().await;

    assert!(env.handle.handshake_plug_in("ChargePal1"));
}

/// S6: with every charging station occupied the retrieve job falls back
/// to a waiting station and upgrades to a stow.
#[tokio::test]
async fn station_picker_exhaustion_stows() {
    let mut cart_locations = BTreeMap::new();
    cart_locations.insert("BAT_2".to_string(), "BCS_1".to_string());
    let mut env = setup(Config {
        robot_count: 1,
        cart_count: 2,
        ads_count: 1,
        bcs_count: 1,
        cart_locations,
    })
    .await;

    // All charging slots taken: the free-station search yields nothing.
    let free = env
        .picker
        .search_free_station(&env.live, &env.plan_db, "ChargePal1", "BCS_")
        .await
        .expect("search");
    assert_eq!(free, "");

    env.create_booking(1, "ADS_1").await;
    let job = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    assert_eq!(job.cart, "BAT_1");
    env.report("ChargePal1", "BRING_CHARGER", "Success");
    env.wait_for_job("ChargePal1", Some(JobType::RechargeSelf)).await;
    env.report("ChargePal1", "RECHARGE_SELF", "Success");

    env.set_booking_status(1, BookingState::Ready).await;
    let job = env.wait_for_job("ChargePal1", Some(JobType::StowCharger)).await;
    assert!(job.target_station.starts_with("BWS_"), "{job:?}");
}

// ── Functional properties ───────────────────────────────────────

/// `fetch_updated_bookings` idempotence: without an intervening live
/// change the second diff is empty, even for updates within the same
/// clock second.
#[tokio::test]
async fn booking_diff_is_value_based() {
    let env = setup(Config::all_one()).await;
    env.create_booking(1, "ADS_1").await;

    let mut reconciler = Reconciler::new();
    reconciler
        .reconcile(&env.live, &env.plan_db)
        .await
        .expect("reconcile");
    let first = reconciler
        .updated_bookings(&env.plan_db)
        .await
        .expect("diff");
    assert_eq!(first.len(), 1);

    // Second pass without any live change: nothing to report, even
    // though last_change still matches the watermark second.
    reconciler
        .reconcile(&env.live, &env.plan_db)
        .await
        .expect("reconcile");
    let second = reconciler
        .updated_bookings(&env.plan_db)
        .await
        .expect("diff");
    assert!(second.is_empty());

    // A same-second status flip is still caught by the value diff.
    env.set_booking_status(1, BookingState::Canceled).await;
    reconciler
        .reconcile(&env.live, &env.plan_db)
        .await
        .expect("reconcile");
    let third = reconciler
        .updated_bookings(&env.plan_db)
        .await
        .expect("diff");
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].charging_session_status, "canceled");
}

/// A merely booked session schedules nothing; checking in triggers the
/// delivery.
#[tokio::test]
async fn booked_sessions_wait_for_check_in() {
    let mut env = setup(Config::all_one()).await;
    env.create_booking_with_status(4, "ADS_1", BookingState::Booked)
        .await;

    for _ in 0..3 {
        env.tick().await;
        let details = env.handle.fetch_job("ChargePal1");
        assert!(details.job_type.is_empty(), "premature job: {details:?}");
    }

    env.set_booking_status(4, BookingState::CheckedIn).await;
    let job = env.wait_for_job("ChargePal1", Some(JobType::BringCharger)).await;
    assert_eq!(job.target_station, "ADS_1");
}

/// Battery telemetry drives cart availability: leaving the recharging
/// state hands the cart back to the free pool.
#[tokio::test]
async fn battery_monitor_frees_cart_on_stop_recharging() {
    let mut env = setup(Config::all_one()).await;
    plan::set_cart_available(&env.plan_db, "BAT_1", false)
        .await
        .expect("cart");
    execute(
        &env.live_conn,
        &format!(
            "INSERT INTO CAN_MSG_RX_LIVE VALUES ('BAT_1', 'BatOK', 1, \
             'Flag_Bat_AC_Charge', 0, 0, 'BatOK_recharging', '{}')",
            datetime_str(now())
        ),
    )
    .await;

    // Recharge start has no structural effect.
    env.tick().await;
    let cart = plan::cart(&env.plan_db, "BAT_1").await.expect("cart");
    assert!(!cart.available);

    env.live
        .update_battery("BAT_1", "Bat_State_actual", "BatOK_idle")
        .await
        .expect("telemetry");
    env.tick().await;
    let cart = plan::cart(&env.plan_db, "BAT_1").await.expect("cart");
    assert!(cart.available, "stop recharging must free the cart");
}

/// A robot polling with nothing to do becomes available and, away from
/// its base station, is sent to recharge itself.
#[tokio::test]
async fn idle_robot_recharges_itself_only_away_from_base() {
    let mut env = setup(Config::all_one()).await;

    // At its base station: no job.
    for _ in 0..3 {
        let details = env.handle.fetch_job("ChargePal1");
        assert!(details.job_type.is_empty(), "unexpected job: {details:?}");
        env.tick().await;
    }

    // Away from base (simulated via the live store): recharge self.
    env.live
        .update_location("ADS_1", "ChargePal1", None)
        .await
        .expect("location");
    let job = env.wait_for_job("ChargePal1", Some(JobType::RechargeSelf)).await;
    assert_eq!(job.target_station, "RBS_1");
}
