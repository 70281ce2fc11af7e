//! DeFiChain Ledger CLI Example
//!
//! This example drives the DeFiChain Ledger app through the driver library,
//! either on the Speculos emulator (default) or on a USB device.
//!
//! # Prerequisites
//!
//! - Speculos running the DeFiChain app with its APDU port on `127.0.0.1:9999`
//! - Or a Ledger device with the DeFiChain app open, and the `hid` feature
//!
//! # Quick Start
//!
//! ```bash
//! # Emulator
//! cargo run --example ledger-cli -p defi-ledger-core -- version
//! cargo run --example ledger-cli -p defi-ledger-core -- pubkey 0 bech32
//!
//! # USB device
//! DEFI_LEDGER_TRANSPORT=hid \
//!   cargo run --example ledger-cli -p defi-ledger-core --features hid -- list
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `list` | List reachable devices |
//! | `version` | Show the app version |
//! | `pubkey [index] [format]` | Show public key and address |
//! | `sign <index> <message>` | Sign a UTF-8 message |
//! | `verify <index> <message> <sig>` | Verify a device-native signature (hex) |
//! | `exit` | Quit the app on the device |
//!
//! # Configuration
//!
//! - `DEFI_LEDGER_TRANSPORT`: `speculos` or `hid`
//! - `DEFI_LEDGER_SPECULOS_ADDR`: emulator address
//! - `DEFI_LEDGER_TIMEOUT_MS`: exchange timeout
//! - `RUST_LOG`: log filter, e.g. `defi_ledger_core=debug` to see APDUs

#![expect(unused_crate_dependencies, reason = "needed for CLI example")]

use std::env;

use defi_ledger_core::{AddressFormat, LedgerConfig, LedgerSession, SignOutcome};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    let config = match LedgerConfig::default().with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    match args[1].as_str() {
        "list" => cmd_list(&config),
        "version" => cmd_version(&config),
        "pubkey" => cmd_pubkey(&config, &args[2..]),
        "sign" => cmd_sign(&config, &args[2..]),
        "verify" => cmd_verify(&config, &args[2..]),
        "exit" => cmd_exit(&config),
        "--help" | "-h" | "help" => print_help(),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_help();
        }
    }
}

fn print_help() {
    println!(
        r#"DeFiChain Ledger CLI

USAGE:
    ledger-cli <COMMAND>

COMMANDS:
    list                          List reachable devices
    version                       Show the app version
    pubkey [index] [format]       Show public key and address
                                  (format: legacy, p2sh, bech32, cashaddr)
    sign <index> <message>        Sign a UTF-8 message (confirm on device)
    verify <index> <message> <sig>
                                  Verify a device-native signature (hex)
    exit                          Quit the app on the device
    help                          Show this help message

EXAMPLES:
    cargo run --example ledger-cli -- pubkey 0 bech32
    cargo run --example ledger-cli -- sign 0 "hello"
    RUST_LOG=defi_ledger_core=debug cargo run --example ledger-cli -- version
"#
    );
}

/// Opens a session on the configured transport, printing any failure.
fn connect(config: &LedgerConfig) -> Option<LedgerSession> {
    let session = match config.session() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Transport unavailable: {e}");
            return None;
        }
    };

    if let Err(e) = session.connect(None) {
        eprintln!("Failed to connect over {}: {e}", config.transport);
        return None;
    }
    Some(session)
}

fn parse_index(arg: Option<&String>) -> Option<u32> {
    match arg {
        None => Some(0),
        Some(s) => match s.parse() {
            Ok(index) => Some(index),
            Err(e) => {
                eprintln!("Invalid key index `{s}`: {e}");
                None
            }
        },
    }
}

fn cmd_list(config: &LedgerConfig) {
    println!("Searching for devices over {}...\n", config.transport);

    let session = match config.session() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Transport unavailable: {e}");
            return;
        }
    };

    match session.list_devices() {
        Ok(devices) if devices.is_empty() => {
            println!("No device found.");
            println!("\nMake sure:");
            println!("  - Speculos is running, or the device is plugged in and unlocked");
            println!("  - The DeFiChain app is open");
        }
        Ok(devices) => {
            println!("Found {} device(s):\n", devices.len());
            for (i, device) in devices.iter().enumerate() {
                println!("  [{}] {}", i + 1, device);
            }
        }
        Err(e) => eprintln!("Error listing devices: {e}"),
    }
}

fn cmd_version(config: &LedgerConfig) {
    let Some(session) = connect(config) else {
        return;
    };

    match session.get_version() {
        Ok(version) if version.is_empty() => println!("App version: (empty)"),
        Ok(version) => match String::from_utf8(version.clone()) {
            Ok(text) if text.chars().all(|c| !c.is_control()) => {
                println!("App version: {text}");
            }
            _ => println!("App version: {}", hex::encode(&version)),
        },
        Err(e) => eprintln!("Failed to read version: {e}"),
    }
}

fn cmd_pubkey(config: &LedgerConfig, args: &[String]) {
    let Some(index) = parse_index(args.first()) else {
        return;
    };
    let format = match args.get(1).map(|s| s.parse::<AddressFormat>()) {
        None => config.address_format,
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            eprintln!("{e}");
            return;
        }
    };
    let Some(session) = connect(config) else {
        return;
    };

    println!("Getting {format} address for key {index} (confirm on device)...\n");
    match session.get_public_key(index, format) {
        Ok(info) => {
            println!("Public Key:");
            println!("  {}", hex::encode(&info.public_key));
            println!();
            println!("Address:");
            println!("  {}", info.address);
        }
        Err(e) => eprintln!("Failed to get public key: {e}"),
    }
}

fn cmd_sign(config: &LedgerConfig, args: &[String]) {
    let (Some(index), Some(message)) = (args.first(), args.get(1)) else {
        eprintln!("Usage: ledger-cli sign <index> <message>");
        return;
    };
    let Some(index) = parse_index(Some(index)) else {
        return;
    };
    let Some(session) = connect(config) else {
        return;
    };

    println!("Signing with key {index} (confirm on device)...\n");
    match session.sign(index, message.as_bytes()) {
        Ok(SignOutcome::Complete(raw)) => {
            println!("Device Signature:");
            println!("  {}", hex::encode(&raw));
            match defi_ledger_core::Signature::from_device(&raw) {
                Ok(signature) => {
                    println!();
                    println!("Signature (R || S || V):");
                    println!("  {signature}");
                }
                Err(e) => eprintln!("Failed to decode signature: {e}"),
            }
        }
        Ok(SignOutcome::Aborted { chunk, code }) => {
            eprintln!("Signing aborted at chunk {chunk} with status {code:#06x}");
        }
        Err(e) => eprintln!("Failed to sign: {e}"),
    }
}

fn cmd_verify(config: &LedgerConfig, args: &[String]) {
    let (Some(index), Some(message), Some(signature)) = (args.first(), args.get(1), args.get(2))
    else {
        eprintln!("Usage: ledger-cli verify <index> <message> <signature-hex>");
        return;
    };
    let Some(index) = parse_index(Some(index)) else {
        return;
    };
    let signature = match hex::decode(signature.trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Invalid signature hex: {e}");
            return;
        }
    };
    let Some(session) = connect(config) else {
        return;
    };

    match session.verify_message(index, message.as_bytes(), &signature) {
        Ok(true) => println!("Signature is valid."),
        Ok(false) => println!("Signature is NOT valid."),
        Err(e) => eprintln!("Failed to verify: {e}"),
    }
}

fn cmd_exit(config: &LedgerConfig) {
    let Some(session) = connect(config) else {
        return;
    };

    match session.exit_app() {
        Ok(()) => println!("App closed."),
        Err(e) => eprintln!("Failed to exit app: {e}"),
    }
}
