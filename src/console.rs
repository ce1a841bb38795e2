//! Interactive stdin console for driving the emulated pad by hand.
//!
//! Each line maps to a button pulse (press, short hold, release). Shorthand
//! keys cover the face buttons and the d-pad; every button is also reachable
//! by its full name. `stk` randomizes both sticks, `quit` releases the
//! bridge.

use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::report::Button;

const HOLD: Duration = Duration::from_millis(60);

/// Run the console until EOF or `quit`, then release the bridge.
pub async fn run(bridge: Bridge) {
    let controller = bridge.controller();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    info!("Console ready; type a button name, 'stk', or 'quit'");
    while let Ok(Some(line)) = lines.next_line().await {
        let cmd = line.trim().to_ascii_lowercase();
        match cmd.as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "stk" => {
                let mut rng = rand::thread_rng();
                let (lx, ly, rx, ry) = rng.gen::<(u8, u8, u8, u8)>();
                controller.set_sticks(lx, ly, rx, ry);
                info!("sticks: L({},{}) R({},{})", lx, ly, rx, ry);
            }
            name => match parse_button(name) {
                Some(button) => {
                    controller.set_button(button, true, None);
                    tokio::time::sleep(HOLD).await;
                    controller.set_button(button, false, None);
                    info!("pulsed {:?}", button);
                }
                None => warn!("unknown input '{}'", name),
            },
        }
    }

    info!("Console closed, releasing bridge");
    bridge.release().await;
}

/// Case-insensitive button lookup: shorthands plus full names.
pub fn parse_button(name: &str) -> Option<Button> {
    match name {
        "x" | "c" | "cross" => Some(Button::Cross),
        "o" | "circle" => Some(Button::Circle),
        "s" | "square" => Some(Button::Square),
        "t" | "triangle" => Some(Button::Triangle),
        "u" | "up" => Some(Button::Up),
        "d" | "down" => Some(Button::Down),
        "l" | "left" => Some(Button::Left),
        "r" | "right" => Some(Button::Right),
        "select" => Some(Button::Select),
        "start" => Some(Button::Start),
        "l1" => Some(Button::L1),
        "l2" => Some(Button::L2),
        "l3" => Some(Button::L3),
        "r1" => Some(Button::R1),
        "r2" => Some(Button::R2),
        "r3" => Some(Button::R3),
        "ps" => Some(Button::Ps),
        _ => None,
    }
}
