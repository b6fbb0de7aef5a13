//! strider — whole-body walking controller harness.
//!
//! Runs the controller at its fixed period on a dedicated thread and drives
//! it from a line-oriented command prompt:
//!
//! ```text
//! strider [controller.toml]
//! > prepare
//! > start
//! > goal 0.3 0.0
//! > pause | stop | status | quit
//! ```
//!
//! Commands and the control tick share one mutex; a command only flips FSM
//! state or the goal, so the tick thread never waits long.

mod rig;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use parking_lot::Mutex;

use strider_control::{LogPublisher, WalkingController};
use strider_core::config::ControllerConfig;
use strider_trajectory::PlannerHandle;

use rig::{RigDriver, RigKinematics, RigPlanner, RigWrenchSensors};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ControllerConfig::from_file(&path) {
            Ok(config) => {
                info!("configuration loaded from {path}");
                config
            }
            Err(err) => {
                error!("unable to load {path}: {err}");
                std::process::exit(1);
            }
        },
        None => {
            info!("no configuration file given, using defaults");
            ControllerConfig::default()
        }
    };

    let period = Duration::from_secs_f64(config.general.sampling_time);
    let dump_data = config.dump_data;

    let (logger, log_receiver) = LogPublisher::channel(256);
    let controller = match WalkingController::new(
        config,
        Box::new(RigDriver::new()),
        Box::new(RigWrenchSensors),
        None,
        Box::new(RigKinematics),
        None,
        PlannerHandle::spawn(RigPlanner),
        dump_data.then_some(logger),
    ) {
        Ok(controller) => Arc::new(Mutex::new(controller)),
        Err(err) => {
            error!("controller setup failed: {err}");
            std::process::exit(1);
        }
    };

    // Best-effort log drain
    if dump_data {
        thread::spawn(move || {
            while let Ok(sample) = log_receiver.recv() {
                info!(
                    "t={:.3} zmp=({:.4}, {:.4}) dcm=({:.4}, {:.4})",
                    sample.time,
                    sample.measured_zmp.x,
                    sample.measured_zmp.y,
                    sample.measured_dcm.x,
                    sample.measured_dcm.y,
                );
            }
        });
    }

    // Fixed-period control thread
    let tick_controller = Arc::clone(&controller);
    let control_thread = thread::spawn(move || {
        let mut next_tick = Instant::now() + period;
        loop {
            // Stopped still ticks: it flushes the final zero command
            tick_controller.lock().update();
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                warn!("control tick overran its period");
            }
            next_tick += period;
        }
    });

    // Command prompt
    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let mut parts = line.split_whitespace();
        let ok = match parts.next() {
            Some("prepare") => controller.lock().prepare_robot(),
            Some("start") => controller.lock().start_walking(),
            Some("pause") => controller.lock().pause_walking(),
            Some("stop") => controller.lock().stop_walking(),
            Some("goal") => {
                let x = parts.next().and_then(|v| v.parse::<f64>().ok());
                let y = parts.next().and_then(|v| v.parse::<f64>().ok());
                match (x, y) {
                    (Some(x), Some(y)) => controller.lock().set_goal(x, y),
                    _ => {
                        warn!("usage: goal <x> <y>");
                        false
                    }
                }
            }
            Some("status") => {
                let controller = controller.lock();
                info!(
                    "state: {:?}, buffer length: {}, t = {}",
                    controller.state(),
                    controller.buffers().len(),
                    controller.clock(),
                );
                true
            }
            Some("quit") => break,
            Some(other) => {
                warn!("unknown command `{other}`");
                false
            }
            None => true,
        };
        if !ok {
            println!("command failed");
        }
        print!("> ");
        let _ = io::stdout().flush();
    }

    drop(control_thread);
    info!("bye");
}
