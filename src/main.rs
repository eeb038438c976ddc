use movehub::{HubError, MoveHub};
use std::thread::sleep;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut hub = MoveHub::new();

    info!("Attempting to connect to Move Hub...");
    if let Err(e) = hub.connect(Duration::from_secs(10)) {
        error!("Failed to connect: {}", e);
        std::process::exit(1);
    }
    info!("Connected to Move Hub");

    if let Err(e) = run_demo(&mut hub) {
        if e.is_fatal() {
            error!("Hub link lost: {}", e);
            std::process::exit(1);
        }
        error!("Command failed: {}", e);
    }

    info!("Disconnecting from Move Hub...");
    hub.disconnect();
    info!("Disconnected");
}

fn run_demo(hub: &mut MoveHub) -> Result<(), HubError> {
    info!("Setting LED color to red...");
    hub.set_led("red")?;
    sleep(Duration::from_secs(2));

    info!("Spinning motor A forward at 50% power...");
    hub.set_motor("motor A", "power", 50)?;
    sleep(Duration::from_secs(3));

    info!("Stopping motor A...");
    hub.set_motor("motor A", "power", 0)?;
    sleep(Duration::from_secs(1));

    info!("Spinning motor B backward at 75% power...");
    hub.set_motor("motor B", "power", -75)?;
    sleep(Duration::from_secs(3));

    info!("Stopping motor B...");
    hub.set_motor("motor B", "power", 0)?;

    Ok(())
}
