use clap::{Args, Parser, Subcommand};
use escpos_receipt::{
    list_devices, known_name, render_receipt, LineItem, Order, PrintOutcome, Printer, PrinterConfig,
    ReceiptFormatter,
};
use log::{debug, error};
use serde::Deserialize;
use std::{
    error::Error,
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process,
};

/// Render and print ESC/POS receipts.
#[derive(Parser, Debug)]
#[command(name = "receipt", version, about)]
struct Cli {
    /// Printer configuration file (TOML).
    #[arg(long, short, global = true, env = "RECEIPT_PRINTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected USB devices and flag likely receipt printers.
    Devices {
        /// Only show likely printers.
        #[arg(long)]
        printers_only: bool,
    },
    /// Write the job bytes to a file instead of printing.
    Render {
        #[arg(long, short)]
        out: PathBuf,
        #[command(flatten)]
        input: Input,
    },
    /// Print a receipt and report the outcome as JSON.
    Print {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args, Debug)]
struct Input {
    /// Receipt text file. Read from stdin when neither --text nor --order is given.
    #[arg(long, conflicts_with = "order")]
    text: Option<PathBuf>,

    /// Order as JSON: {"order": {...}, "items": [...], "receipt": {...}}.
    #[arg(long)]
    order: Option<PathBuf>,

    /// Logo image, overriding the configured one.
    #[arg(long, conflicts_with = "no_logo")]
    logo: Option<PathBuf>,

    /// Print without a logo.
    #[arg(long)]
    no_logo: bool,
}

#[derive(Deserialize)]
struct OrderFile {
    order: Order,
    items: Vec<LineItem>,
    #[serde(default)]
    receipt: ReceiptFormatter,
}

impl Input {
    fn receipt_text(&self) -> Result<String, Box<dyn Error>> {
        if let Some(path) = &self.order {
            let file: OrderFile = serde_json::from_str(&fs::read_to_string(path)?)?;
            return Ok(file.receipt.format(&file.order, &file.items));
        }
        match &self.text {
            Some(path) => Ok(fs::read_to_string(path)?),
            None => {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }

    fn apply(&self, config: PrinterConfig) -> PrinterConfig {
        if self.no_logo {
            config.without_logo()
        } else if let Some(logo) = &self.logo {
            config.logo(logo.clone())
        } else {
            config
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PrinterConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(PrinterConfig::load(path)?),
        None => {
            debug!("No configuration file, using defaults");
            Ok(PrinterConfig::default())
        }
    }
}

fn devices(printers_only: bool) -> Result<(), Box<dyn Error>> {
    let context = rusb::Context::new()?;
    let devices = list_devices(&context)?;
    let mut printers = Vec::new();

    for device in &devices {
        let probable = device.is_probable_printer();
        if printers_only && !probable {
            continue;
        }
        let label = known_name(device.vendor_id, device.product_id)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "{} {}",
                    device.manufacturer.as_deref().unwrap_or("?"),
                    device.product.as_deref().unwrap_or("?")
                )
            });
        println!(
            "Bus {:03} Device {:03}: ID {} {}{}",
            device.bus,
            device.address,
            device.id(),
            label,
            if probable { "  <- printer" } else { "" }
        );
        if probable {
            printers.push(device.id());
        }
    }

    match printers.first() {
        Some(id) => {
            println!();
            println!("Add to the printer configuration:");
            println!();
            println!("[device]");
            println!("kind = \"usb\"");
            println!("vendor_id = 0x{:04x}", id.vendor_id);
            println!("product_id = 0x{:04x}", id.product_id);
        }
        None => println!("No receipt printer found among {} USB devices", devices.len()),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    match cli.command {
        Command::Devices { printers_only } => {
            devices(printers_only)?;
            Ok(true)
        }
        Command::Render { out, input } => {
            let config = input.apply(load_config(cli.config.as_deref())?);
            config.validate()?;
            let job = render_receipt(config.logo_path(), &input.receipt_text()?, &config)?;
            fs::write(&out, job.as_bytes())?;
            println!("Wrote {} bytes to {}", job.len(), out.display());
            Ok(true)
        }
        Command::Print { input } => {
            let config = input.apply(load_config(cli.config.as_deref())?);
            let text = input.receipt_text()?;
            let outcome = match Printer::new(config) {
                Ok(printer) => printer.print_receipt(&text),
                Err(err) => PrintOutcome::failed(err.to_string()),
            };
            let stdout = io::stdout();
            writeln!(stdout.lock(), "{}", outcome.to_json())?;
            Ok(outcome.success)
        }
    }
}

fn main() {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    if let Err(err) = dotenv {
        debug!("No .env loaded: {}", err);
    }
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            process::exit(1);
        }
    }
}
