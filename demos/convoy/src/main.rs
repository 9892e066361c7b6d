//! convoy — smallest end-to-end demo for the lockstep kernel.
//!
//! Simulates a convoy of vehicles circling a one-kilometre ring road.  Each
//! vehicle is an independent entity that follows the car ahead: every tick
//! it reads the leader's committed position, adjusts its speed toward a safe
//! headway, and stages its own new position and speed for the buffer flip.
//! Because reads only ever see last tick's committed values, the update
//! order of vehicles within a tick cannot influence the result.
//!
//! Two work groups share the tick schedule:
//! - `traffic` — four workers advancing the vehicles every tick;
//! - `sensors` — one worker on a 50-tick macro step, sampling the mean
//!   convoy speed at each of its boundaries.
//!
//! Vehicles retire after a randomized distance budget, so the run also
//! exercises staged admission (staggered start ticks) and deferred removal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use ls_agent::{Entity, UpdateResult};
use ls_core::{EntityId, KernelConfig, Tick, TimeSlice, WorkerId};
use ls_kernel::{AssignStrategy, GroupConfig, WorkGroupManager};
use ls_state::{CellHandle, DoubleBuffered};

// ── Constants ─────────────────────────────────────────────────────────────────

const RING_LENGTH_M:      f64   = 1_000.0;
const VEHICLES:           usize = 24;
const WORKERS:            usize = 4;
const SEED:               u64   = 42;
const TICK_MILLIS:        u32   = 100;   // 1 tick = 100 ms
const TOTAL_TICKS:        u64   = 3_000; // 5 simulated minutes
const SENSOR_STEP_TICKS:  u64   = 50;    // sensor samples every 5 s
const SENSOR_PRINT_EVERY: u64   = 10;

const V_MAX_MPS:     f64 = 14.0; // ~50 km/h
const MIN_GAP_M:     f64 = 8.0;
const HEADWAY_SECS:  f64 = 1.5;
const ACCEL_MPS2:    f64 = 2.0;
const BRAKE_MPS2:    f64 = 4.0;

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// One car on the ring, following the car that started ahead of it.
struct Vehicle {
    id:       EntityId,
    start:    Tick,
    dt_secs:  f64,
    position: Arc<DoubleBuffered<f64>>,
    speed:    Arc<DoubleBuffered<f64>>,
    /// The leader's position cell — read-only from this vehicle.
    lead_position: Arc<DoubleBuffered<f64>>,
    travelled: f64,
    /// Retire after covering this distance.
    budget:    f64,
}

impl Entity for Vehicle {
    fn id(&self) -> EntityId {
        self.id
    }

    fn start_tick(&self) -> Tick {
        self.start
    }

    fn subscriptions(&self) -> Vec<CellHandle> {
        vec![self.position.handle(), self.speed.handle()]
    }

    fn update(&mut self, _now: TimeSlice) -> UpdateResult {
        let pos = self.position.read();
        let v = self.speed.read();
        let gap = (self.lead_position.read() - pos).rem_euclid(RING_LENGTH_M);

        // Constant-headway car following: aim for the speed that keeps
        // `HEADWAY_SECS` of travel between us and the leader.
        let target = ((gap - MIN_GAP_M) / HEADWAY_SECS).clamp(0.0, V_MAX_MPS);
        let v_new = if target > v {
            (v + ACCEL_MPS2 * self.dt_secs).min(target)
        } else {
            (v - BRAKE_MPS2 * self.dt_secs).max(target)
        };
        let pos_new = (pos + v_new * self.dt_secs).rem_euclid(RING_LENGTH_M);

        self.position.write(pos_new);
        self.speed.write(v_new);

        self.travelled += v_new * self.dt_secs;
        if self.travelled >= self.budget {
            UpdateResult::done()
        } else {
            UpdateResult::continuing()
        }
    }
}

// ── SpeedSensor ───────────────────────────────────────────────────────────────

/// Roadside sensor on a slow macro step: samples the mean committed speed of
/// the whole convoy and publishes it through its own cell.
struct SpeedSensor {
    id:      EntityId,
    speeds:  Vec<Arc<DoubleBuffered<f64>>>,
    mean:    Arc<DoubleBuffered<f64>>,
    samples: u64,
}

impl Entity for SpeedSensor {
    fn id(&self) -> EntityId {
        self.id
    }

    fn subscriptions(&self) -> Vec<CellHandle> {
        vec![self.mean.handle()]
    }

    fn update(&mut self, now: TimeSlice) -> UpdateResult {
        let mean =
            self.speeds.iter().map(|s| s.read()).sum::<f64>() / self.speeds.len() as f64;
        self.mean.write(mean);

        self.samples += 1;
        if self.samples % SENSOR_PRINT_EVERY == 0 {
            println!("[sensor] {now}  mean convoy speed {mean:.1} m/s");
        }
        UpdateResult::continuing()
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let config = KernelConfig { tick_millis: TICK_MILLIS, total_ticks: TOTAL_TICKS };
    let mut mgr = WorkGroupManager::new(config);

    let traffic = mgr
        .create_group(GroupConfig::new(WORKERS).with_strategy(AssignStrategy::LeastLoaded))?;
    let sensors = mgr.create_group(GroupConfig::new(1).with_tick_step(SENSOR_STEP_TICKS))?;

    // Stand-in for the external partition/spatial-index collaborator.
    let cross_syncs = Arc::new(AtomicU64::new(0));
    {
        let cross_syncs = cross_syncs.clone();
        mgr.set_cross_sync_hook(Arc::new(move |_tick| {
            cross_syncs.fetch_add(1, Ordering::Relaxed);
        }));
    }

    mgr.init_all()?;

    // Vehicles start evenly spaced around the ring, each following the next.
    let mut rng = SmallRng::seed_from_u64(SEED);
    let positions: Vec<Arc<DoubleBuffered<f64>>> = (0..VEHICLES)
        .map(|i| DoubleBuffered::shared(i as f64 * RING_LENGTH_M / VEHICLES as f64))
        .collect();
    let speeds: Vec<Arc<DoubleBuffered<f64>>> = (0..VEHICLES)
        .map(|_| DoubleBuffered::shared(rng.gen_range(8.0..V_MAX_MPS)))
        .collect();

    for i in 0..VEHICLES {
        let vehicle = Vehicle {
            id:            EntityId(i as u64),
            // Staggered admission: a quarter of the convoy joins every second.
            start:         Tick((i as u64 % 4) * 10),
            dt_secs:       TICK_MILLIS as f64 / 1_000.0,
            position:      positions[i].clone(),
            speed:         speeds[i].clone(),
            lead_position: positions[(i + 1) % VEHICLES].clone(),
            travelled:     0.0,
            budget:        rng.gen_range(2.0..4.0) * RING_LENGTH_M,
        };
        mgr.group_mut(traffic)?.schedule_entity(Box::new(vehicle));
    }

    let mean_speed = DoubleBuffered::shared(0.0);
    let sensor = SpeedSensor {
        id:      EntityId(VEHICLES as u64),
        speeds:  speeds.clone(),
        mean:    mean_speed.clone(),
        samples: 0,
    };
    mgr.group_mut(sensors)?.admit(Box::new(sensor), WorkerId(0))?;

    println!(
        "convoy: {VEHICLES} vehicles, {WORKERS} workers, {TOTAL_TICKS} ticks \
         ({:.0} s simulated)",
        TOTAL_TICKS as f64 * TICK_MILLIS as f64 / 1_000.0,
    );

    let started = Instant::now();
    mgr.start_all()?;
    mgr.run()?;
    let elapsed = started.elapsed();

    println!();
    println!("finished in {elapsed:.2?}");
    println!("cross-sync rounds observed: {}", cross_syncs.load(Ordering::Relaxed));
    println!("final mean convoy speed:    {:.1} m/s", mean_speed.read());
    for (i, position) in positions.iter().take(4).enumerate() {
        println!("vehicle {i}: parked at {:.0} m", position.read());
    }

    Ok(())
}
