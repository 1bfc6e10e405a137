//! emuwalker command-line host
//!
//! Loads the flash ROM and EEPROM images, brings the core up, and drives it
//! with the headless frontend:
//!
//! ```text
//! emuwalker --rom <flash.bin> --eeprom <eeprom.bin> [--frames <n>]
//! ```
//!
//! Both image flags are required and the files must be exactly 48 KiB and
//! 64 KiB. `--frames` stops after n frames (useful for scripted runs);
//! without it the emulator runs until the process is interrupted.

use emuwalker::frontend::{run, Frontend, HeadlessFrontend};
use emuwalker::{Core, CoreError, CoreFile};
use log::info;
use std::error::Error;
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = run_emulator(&args[1..]) {
        eprintln!("emuwalker: {err}");
        std::process::exit(1);
    }
}

fn run_emulator(args: &[String]) -> Result<(), Box<dyn Error>> {
    let mut rom_path: Option<PathBuf> = None;
    let mut eeprom_path: Option<PathBuf> = None;
    let mut frames: Option<u64> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                rom_path = Some(PathBuf::from(require_arg(args, i, "--rom")?));
            }
            "--eeprom" => {
                i += 1;
                eeprom_path = Some(PathBuf::from(require_arg(args, i, "--eeprom")?));
            }
            "--frames" => {
                i += 1;
                frames = Some(require_arg(args, i, "--frames")?.parse()?);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unexpected argument: {other}").into());
            }
        }
        i += 1;
    }

    let Some(rom_path) = rom_path else {
        print_help();
        return Err("missing --rom <flash.bin>".into());
    };
    let Some(eeprom_path) = eeprom_path else {
        print_help();
        return Err("missing --eeprom <eeprom.bin>".into());
    };

    let mut core = Core::new();
    core.preinit();
    core.load_file(CoreFile::FlashRom, read_image(&rom_path)?)?;
    core.load_file(CoreFile::Eeprom, read_image(&eeprom_path)?)?;
    core.init()?;

    info!("images loaded, starting emulation");

    let mut frontend = HeadlessFrontend::new(frames);
    frontend.init().map_err(Box::<dyn Error>::from)?;
    run(&mut core, &mut frontend);

    info!(
        "stopped after {} frames; final state: {}",
        frontend.frames(),
        serde_json::to_string(&core.snapshot())?
    );
    Ok(())
}

fn read_image(path: &PathBuf) -> Result<Vec<u8>, CoreError> {
    std::fs::read(path).map_err(|_| CoreError::MissingFile {
        path: path.display().to_string(),
    })
}

fn require_arg<'a>(args: &'a [String], idx: usize, flag: &str) -> Result<&'a str, Box<dyn Error>> {
    args.get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("missing value for {flag}").into())
}

fn print_help() {
    eprintln!("usage: emuwalker --rom <flash.bin> --eeprom <eeprom.bin> [--frames <n>]");
    eprintln!();
    eprintln!("  --rom <path>     48 KiB flash ROM image (required)");
    eprintln!("  --eeprom <path>  64 KiB EEPROM image (required)");
    eprintln!("  --frames <n>     stop after n frames instead of running forever");
}
