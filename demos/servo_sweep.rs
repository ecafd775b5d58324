//! Sweep two simulated servos in 10-degree steps and print the pulses they receive.
//!
//! Run with `cargo run --example servo_sweep`.

use soft_servo::sim::{SIM_CONFIG, SimGpio, SimTimer, Simulation};
use soft_servo::{Pin, Port, SoftServo, soft_servo};

soft_servo! {
    static SERVOS: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

// 2 ticks per microsecond.
const TICKS_PER_US: u64 = 2;

fn main() -> soft_servo::Result<()> {
    let pan = SERVOS.register(Port::D, Pin::P4)?;
    let tilt = SERVOS.register(Port::D, Pin::P5)?;
    let simulation = Simulation::new(&SERVOS);

    SERVOS.set_angle_by_id(pan, 0);
    SERVOS.set_angle_by_id(tilt, 180);
    show(&simulation, "ends");
    SERVOS.center(pan);
    SERVOS.center(tilt);
    show(&simulation, "center");

    // Loop by 10 degrees. Include 180 degrees.
    for degrees in (0..=180).step_by(10) {
        SERVOS.set_angle_by_id(pan, degrees);
        SERVOS.set_angle_by_id(tilt, SERVOS.config().max_degrees.saturating_sub(degrees));
        show(&simulation, &format!("pan {degrees:>3}"));
    }

    SERVOS.relax_by_pin(Port::D, Pin::P4);
    show(&simulation, "pan relaxed");
    Ok(())
}

/// Let one frame go by so the new angles reach the outputs, then print the next frame.
fn show(simulation: &Simulation<'_, { soft_servo::SERVO_MAX_NUM }>, label: &str) {
    let _ = simulation.run_frame();
    let Some(frame) = simulation.run_frame() else {
        println!("{label}: timer not running");
        return;
    };
    let widths: Vec<String> = simulation
        .pulses_in(frame)
        .iter()
        .map(|pulse| format!("{:?}{:?} {} us", pulse.port, pulse.pin, pulse.width() / TICKS_PER_US))
        .collect();
    println!(
        "{label}: frame {} us, {}",
        frame.duration() / TICKS_PER_US,
        widths.join(", ")
    );
    SERVOS.with_gpio(SimGpio::clear_edges);
}
