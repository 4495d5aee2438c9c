//! Typed access to the planning store.
//!
//! Every function takes any `ConnectionTrait` so the planner can run a
//! whole tick inside one transaction. The functions are plain CRUD;
//! lifecycle rules live with the planner, which asserts transitions
//! before writing them here.

use std::collections::BTreeMap;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, JobState, JobType, Layout, MAX_DISTANCE};
use crate::infrastructure::database::entities::{booking, cart, distance, job, robot, station};
use crate::infrastructure::database::live::LiveValue;

// ── Robots ──────────────────────────────────────────────────────

pub async fn robot<C: ConnectionTrait>(db: &C, name: &str) -> DomainResult<robot::Model> {
    robot::Entity::find_by_id(name)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Robot", "name", name))
}

pub async fn robots<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<robot::Model>> {
    Ok(robot::Entity::find()
        .order_by_asc(robot::Column::Name)
        .all(db)
        .await?)
}

pub async fn available_robots<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<robot::Model>> {
    Ok(robot::Entity::find()
        .filter(robot::Column::Available.eq(true))
        .order_by_asc(robot::Column::Name)
        .all(db)
        .await?)
}

/// Copy live telemetry into a robot row (reconciler step 1).
pub async fn update_robot_telemetry<C: ConnectionTrait>(
    db: &C,
    name: &str,
    location: &str,
    ongoing_action: Option<String>,
    previous_action: Option<String>,
    charge: f64,
    error_count: i32,
) -> DomainResult<()> {
    robot::Entity::update_many()
        .col_expr(robot::Column::Location, Expr::value(location))
        .col_expr(robot::Column::OngoingAction, Expr::value(ongoing_action))
        .col_expr(robot::Column::PreviousAction, Expr::value(previous_action))
        .col_expr(robot::Column::RobotCharge, Expr::value(charge))
        .col_expr(robot::Column::ErrorCount, Expr::value(error_count))
        .filter(robot::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_robot_available<C: ConnectionTrait>(
    db: &C,
    name: &str,
    available: bool,
) -> DomainResult<()> {
    robot::Entity::update_many()
        .col_expr(robot::Column::Available, Expr::value(available))
        .filter(robot::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_robot_job<C: ConnectionTrait>(
    db: &C,
    name: &str,
    job_id: Option<i32>,
) -> DomainResult<()> {
    robot::Entity::update_many()
        .col_expr(robot::Column::CurrentJobId, Expr::value(job_id))
        .filter(robot::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_robot_location<C: ConnectionTrait>(
    db: &C,
    name: &str,
    location: &str,
) -> DomainResult<()> {
    robot::Entity::update_many()
        .col_expr(robot::Column::Location, Expr::value(location))
        .filter(robot::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

// ── Carts ───────────────────────────────────────────────────────

pub async fn cart<C: ConnectionTrait>(db: &C, name: &str) -> DomainResult<cart::Model> {
    cart::Entity::find_by_id(name)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Cart", "name", name))
}

pub async fn carts<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<cart::Model>> {
    Ok(cart::Entity::find()
        .order_by_asc(cart::Column::Name)
        .all(db)
        .await?)
}

/// Available carts able to deliver at least `min_charge`.
pub async fn available_carts<C: ConnectionTrait>(
    db: &C,
    min_charge: f64,
) -> DomainResult<Vec<cart::Model>> {
    Ok(cart::Entity::find()
        .filter(cart::Column::Available.eq(true))
        .filter(cart::Column::CartCharge.gte(min_charge))
        .order_by_asc(cart::Column::Name)
        .all(db)
        .await?)
}

pub async fn set_cart_location<C: ConnectionTrait>(
    db: &C,
    name: &str,
    location: &str,
) -> DomainResult<()> {
    cart::Entity::update_many()
        .col_expr(cart::Column::Location, Expr::value(location))
        .filter(cart::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_cart_available<C: ConnectionTrait>(
    db: &C,
    name: &str,
    available: bool,
) -> DomainResult<()> {
    cart::Entity::update_many()
        .col_expr(cart::Column::Available, Expr::value(available))
        .filter(cart::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

/// Bind or clear the booking a cart is fulfilling.
pub async fn bind_cart_booking<C: ConnectionTrait>(
    db: &C,
    name: &str,
    booking_id: Option<i64>,
) -> DomainResult<()> {
    cart::Entity::update_many()
        .col_expr(cart::Column::BookingId, Expr::value(booking_id))
        .filter(cart::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn cart_with_booking<C: ConnectionTrait>(
    db: &C,
    booking_id: i64,
) -> DomainResult<Option<cart::Model>> {
    Ok(cart::Entity::find()
        .filter(cart::Column::BookingId.eq(booking_id))
        .one(db)
        .await?)
}

// ── Stations ────────────────────────────────────────────────────

pub async fn station<C: ConnectionTrait>(db: &C, name: &str) -> DomainResult<station::Model> {
    station::Entity::find_by_id(name)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Station", "name", name))
}

pub async fn try_station<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> DomainResult<Option<station::Model>> {
    Ok(station::Entity::find_by_id(name).one(db).await?)
}

pub async fn stations<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<station::Model>> {
    Ok(station::Entity::find()
        .order_by_asc(station::Column::Name)
        .all(db)
        .await?)
}

pub async fn stations_with_prefix<C: ConnectionTrait>(
    db: &C,
    prefix: &str,
) -> DomainResult<Vec<station::Model>> {
    Ok(station::Entity::find()
        .filter(station::Column::Name.starts_with(prefix))
        .order_by_asc(station::Column::Name)
        .all(db)
        .await?)
}

pub async fn set_station_available<C: ConnectionTrait>(
    db: &C,
    name: &str,
    available: bool,
) -> DomainResult<()> {
    station::Entity::update_many()
        .col_expr(station::Column::Available, Expr::value(available))
        .filter(station::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

/// Reserve a station for a cart, or clear the reservation.
pub async fn set_station_reservation<C: ConnectionTrait>(
    db: &C,
    name: &str,
    cart: Option<&str>,
) -> DomainResult<()> {
    station::Entity::update_many()
        .col_expr(
            station::Column::Reservation,
            Expr::value(cart.map(str::to_string)),
        )
        .filter(station::Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(())
}

// ── Jobs ────────────────────────────────────────────────────────

pub struct NewJob {
    pub job_type: JobType,
    pub state: JobState,
    pub schedule: chrono::NaiveDateTime,
    pub deadline: Option<chrono::NaiveDateTime>,
    pub booking_id: Option<i64>,
    pub currently_assigned: bool,
    pub robot_name: Option<String>,
    pub cart_name: Option<String>,
    pub source_station: Option<String>,
    pub target_station: Option<String>,
    pub charging_type: Option<String>,
    pub port_location: Option<String>,
}

impl NewJob {
    pub fn open(job_type: JobType, schedule: chrono::NaiveDateTime) -> Self {
        Self {
            job_type,
            state: JobState::Open,
            schedule,
            deadline: None,
            booking_id: None,
            currently_assigned: false,
            robot_name: None,
            cart_name: None,
            source_station: None,
            target_station: None,
            charging_type: None,
            port_location: None,
        }
    }
}

async fn next_job_id<C: ConnectionTrait>(db: &C) -> DomainResult<i32> {
    let max = job::Entity::find()
        .order_by_desc(job::Column::Id)
        .one(db)
        .await?
        .map(|j| j.id)
        .unwrap_or(0);
    Ok(max + 1)
}

pub async fn insert_job<C: ConnectionTrait>(db: &C, new: NewJob) -> DomainResult<job::Model> {
    let id = next_job_id(db).await?;
    let model = job::ActiveModel {
        id: Set(id),
        job_type: Set(new.job_type.as_str().to_string()),
        state: Set(new.state.as_str().to_string()),
        schedule: Set(new.schedule),
        deadline: Set(new.deadline),
        booking_id: Set(new.booking_id),
        currently_assigned: Set(new.currently_assigned),
        robot_name: Set(new.robot_name),
        cart_name: Set(new.cart_name),
        source_station: Set(new.source_station),
        target_station: Set(new.target_station),
        charging_type: Set(new.charging_type),
        port_location: Set(new.port_location),
        start: Set(None),
        end: Set(None),
    };
    let inserted = model.insert(db).await?;
    debug!(
        id = inserted.id,
        job_type = inserted.job_type.as_str(),
        "Job created"
    );
    Ok(inserted)
}

pub async fn job<C: ConnectionTrait>(db: &C, id: i32) -> DomainResult<job::Model> {
    job::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Job", "id", id.to_string()))
}

pub async fn jobs<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<job::Model>> {
    Ok(job::Entity::find().order_by_asc(job::Column::Id).all(db).await?)
}

/// Open jobs in insertion order; the scheduler walks these.
pub async fn open_jobs<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<job::Model>> {
    Ok(job::Entity::find()
        .filter(job::Column::State.eq(JobState::Open.as_str()))
        .order_by_asc(job::Column::Id)
        .all(db)
        .await?)
}

pub async fn jobs_in_states<C: ConnectionTrait>(
    db: &C,
    states: &[JobState],
) -> DomainResult<Vec<job::Model>> {
    let names: Vec<&str> = states.iter().map(JobState::as_str).collect();
    Ok(job::Entity::find()
        .filter(job::Column::State.is_in(names))
        .order_by_asc(job::Column::Id)
        .all(db)
        .await?)
}

/// Jobs for a booking that still hold resources.
pub async fn live_jobs_for_booking<C: ConnectionTrait>(
    db: &C,
    booking_id: i64,
) -> DomainResult<Vec<job::Model>> {
    Ok(job::Entity::find()
        .filter(job::Column::BookingId.eq(booking_id))
        .filter(job::Column::State.is_in([
            JobState::Open.as_str(),
            JobState::Pending.as_str(),
            JobState::Ongoing.as_str(),
        ]))
        .order_by_asc(job::Column::Id)
        .all(db)
        .await?)
}

/// The job a robot currently holds (PENDING or ONGOING).
pub async fn assigned_job_for_robot<C: ConnectionTrait>(
    db: &C,
    robot_name: &str,
) -> DomainResult<Option<job::Model>> {
    Ok(job::Entity::find()
        .filter(job::Column::RobotName.eq(robot_name))
        .filter(job::Column::CurrentlyAssigned.eq(true))
        .one(db)
        .await?)
}

// ── Bookings snapshot ───────────────────────────────────────────

pub async fn booking<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> DomainResult<Option<booking::Model>> {
    Ok(booking::Entity::find_by_id(id).one(db).await?)
}

pub async fn bookings<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .order_by_asc(booking::Column::Id)
        .all(db)
        .await?)
}

/// Insert the booking snapshot when unknown, update it otherwise.
pub async fn upsert_booking<C: ConnectionTrait>(
    db: &C,
    model: booking::Model,
) -> DomainResult<()> {
    let existing = booking::Entity::find_by_id(model.id).one(db).await?;
    let active: booking::ActiveModel = model.into();
    if existing.is_some() {
        active.reset_all().update(db).await?;
    } else {
        active.insert(db).await?;
    }
    Ok(())
}

// ── Distances ───────────────────────────────────────────────────

pub async fn insert_distances<C: ConnectionTrait>(
    db: &C,
    station_names: &[String],
) -> DomainResult<()> {
    for source in station_names {
        for target in station_names {
            let model = distance::ActiveModel {
                start: Set(source.clone()),
                target: Set(target.clone()),
                distance: Set(Layout::distance(source, target)),
            };
            model.insert(db).await?;
        }
    }
    Ok(())
}

/// Materialized layout distance; unknown pairs lose every tie-break.
pub async fn distance<C: ConnectionTrait>(db: &C, start: &str, target: &str) -> DomainResult<f64> {
    Ok(distance::Entity::find()
        .filter(distance::Column::Start.eq(start))
        .filter(distance::Column::Target.eq(target))
        .one(db)
        .await?
        .map(|d| d.distance)
        .unwrap_or(MAX_DISTANCE))
}

// ── Seeding ─────────────────────────────────────────────────────

/// Clear all planning tables.
pub async fn clear<C: ConnectionTrait>(db: &C) -> DomainResult<()> {
    job::Entity::delete_many().exec(db).await?;
    booking::Entity::delete_many().exec(db).await?;
    distance::Entity::delete_many().exec(db).await?;
    station::Entity::delete_many().exec(db).await?;
    cart::Entity::delete_many().exec(db).await?;
    robot::Entity::delete_many().exec(db).await?;
    Ok(())
}

/// Build the planning store from the live database: robots and carts
/// from their info tables, stations from the env name lists, and the
/// full distance relation from the layout. A station starts available
/// unless something already stands on it.
pub async fn seed_from_live<C: ConnectionTrait>(
    db: &C,
    env_infos: &BTreeMap<String, Vec<String>>,
    robot_infos: &BTreeMap<String, BTreeMap<String, LiveValue>>,
    cart_infos: &BTreeMap<String, BTreeMap<String, LiveValue>>,
) -> DomainResult<()> {
    clear(db).await?;

    let mut used_locations: Vec<String> = Vec::new();
    let empty = Vec::new();

    for name in env_infos.get("robot_names").unwrap_or(&empty) {
        let location = robot_infos
            .get(name)
            .and_then(|row| row.get("robot_location"))
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default();
        used_locations.push(location.clone());
        robot::ActiveModel {
            name: Set(name.clone()),
            location: Set(location),
            current_job_id: Set(None),
            ongoing_action: Set(None),
            previous_action: Set(None),
            cart_on_robot: Set(None),
            robot_charge: Set(100.0),
            available: Set(true),
            error_count: Set(0),
        }
        .insert(db)
        .await?;
    }

    for name in env_infos.get("cart_names").unwrap_or(&empty) {
        let location = cart_infos
            .get(name)
            .and_then(|row| row.get("cart_location"))
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default();
        used_locations.push(location.clone());
        cart::ActiveModel {
            name: Set(name.clone()),
            location: Set(location),
            booking_id: Set(None),
            plugged: Set(false),
            action_state: Set(None),
            mode_response: Set(None),
            state_of_charge: Set(None),
            status_flag: Set(None),
            charger_ok: Set(false),
            charger_state: Set(None),
            charger_error: Set(false),
            balancing_request: Set(false),
            cart_charge: Set(100.0),
            available: Set(true),
            error_count: Set(0),
        }
        .insert(db)
        .await?;
    }

    let mut station_names: Vec<String> = Vec::new();
    for key in ["rbs_names", "bws_names", "ads_names", "bcs_names"] {
        for name in env_infos.get(key).unwrap_or(&empty) {
            station_names.push(name.clone());
            station::ActiveModel {
                name: Set(name.clone()),
                pose: Set(String::new()),
                reservation: Set(None),
                available: Set(!used_locations.contains(name)),
            }
            .insert(db)
            .await?;
        }
    }

    insert_distances(db, &station_names).await?;
    Ok(())
}
