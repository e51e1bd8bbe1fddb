//! Simulate a PDCP bearer end to end over an unreliable, adversarial channel.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command as ClapCommand};
use pdcp_channel::{Impairments, Tamper, Target};
use pdcp_security::{generate_key, Direction};
use rand::{rngs::StdRng, SeedableRng};
use simulator::{crate_version, parse_key, run, Config, Error, SecurityConfig};
use std::process::exit;
use tracing::{debug, Level};

/// Flags that enable random channel faults.
const IMPAIRMENT_FLAGS: [&str; 5] = [
    "loss",
    "duplication",
    "reordering",
    "corruption",
    "reorder-delay",
];

fn main() {
    let matches = command().get_matches();

    // Initialize logging (stdout is reserved for the output)
    let level = matches
        .get_one::<String>("log-level")
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match parse_config(&matches) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            exit(1);
        }
    };
    debug!(?cfg.tamper, ?cfg.impairments, "parsed configuration");
    let output = match run(&cfg) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("error: {err}");
            exit(1);
        }
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("error: failed to serialize output: {err}");
            exit(1);
        }
    }
}

fn command() -> ClapCommand {
    ClapCommand::new("pdcp-simulator")
        .about("Simulate a PDCP bearer end to end over an unreliable, adversarial channel")
        .version(crate_version())
        .arg(
            Arg::new("sdus")
                .long("sdus")
                .value_parser(value_parser!(u64))
                .default_value("1000")
                .help("Number of SDUs to send"),
        )
        .arg(
            Arg::new("tamper")
                .long("tamper")
                .action(ArgAction::SetTrue)
                .help("Flip a bit of one SDU in transit"),
        )
        .arg(
            Arg::new("tamper-sdu")
                .long("tamper-sdu")
                .value_parser(value_parser!(u64))
                .default_value("1")
                .help("SDU to tamper with"),
        )
        .arg(
            Arg::new("tamper-target")
                .long("tamper-target")
                .value_parser(["ciphertext", "mac"])
                .default_value("ciphertext")
                .help("Field to tamper with"),
        )
        .arg(probability("loss", "Probability a frame is dropped (default 0.01)"))
        .arg(probability(
            "duplication",
            "Probability a frame is duplicated (default 0.01)",
        ))
        .arg(probability(
            "reordering",
            "Probability a frame is delayed (default 0.02)",
        ))
        .arg(probability(
            "corruption",
            "Probability a bit of a frame is flipped (default 0.005)",
        ))
        .arg(
            Arg::new("reorder-delay")
                .long("reorder-delay")
                .value_parser(value_parser!(u64))
                .help("Slots a delayed frame is held (default 3)"),
        )
        .arg(
            Arg::new("sn-bits")
                .long("sn-bits")
                .value_parser(value_parser!(u8))
                .default_value("12")
                .help("SN length in bits (12 or 18)"),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .value_parser(value_parser!(u32))
                .help("Receive window (default: half the SN space)"),
        )
        .arg(
            Arg::new("t-reordering")
                .long("t-reordering")
                .value_parser(value_parser!(u64))
                .default_value("20")
                .help("t-Reordering duration in slots"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("0")
                .help("Seed for the channel and generated keys"),
        )
        .arg(
            Arg::new("integrity-key")
                .long("integrity-key")
                .value_parser(value_parser!(String))
                .help("Hex-encoded 128-bit integrity key (default: derived from the seed)"),
        )
        .arg(
            Arg::new("ciphering-key")
                .long("ciphering-key")
                .value_parser(value_parser!(String))
                .help("Hex-encoded 128-bit ciphering key (default: derived from the seed)"),
        )
        .arg(
            Arg::new("bearer")
                .long("bearer")
                .value_parser(value_parser!(u8))
                .default_value("1")
                .help("Bearer identity (0-31)"),
        )
        .arg(
            Arg::new("direction")
                .long("direction")
                .value_parser(["uplink", "downlink"])
                .default_value("uplink")
                .help("Direction of the bearer"),
        )
        .arg(
            Arg::new("no-drain")
                .long("no-drain")
                .action(ArgAction::SetTrue)
                .help("Stop at the last SDU instead of letting t-Reordering run out"),
        )
        .arg(
            Arg::new("sample-interval")
                .long("sample-interval")
                .value_parser(value_parser!(u64))
                .help("Slots between state samples (default: sdus / 200)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("warn")
                .help("Verbosity of the log written to stderr"),
        )
}

fn probability(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(f64))
        .help(help)
}

fn parse_config(matches: &ArgMatches) -> Result<Config, Error> {
    let seed = matches.get_one::<u64>("seed").copied().unwrap_or_default();
    let sdu_count = matches
        .get_one::<u64>("sdus")
        .copied()
        .unwrap_or(simulator::config::DEFAULT_SDU_COUNT);

    let tamper = matches.get_flag("tamper").then(|| Tamper {
        sdu_id: matches
            .get_one::<u64>("tamper-sdu")
            .copied()
            .unwrap_or(simulator::config::DEFAULT_TAMPER_SDU),
        target: match matches.get_one::<String>("tamper-target").map(String::as_str) {
            Some("mac") => Target::MacI,
            _ => Target::Ciphertext,
        },
    });

    let impairments = IMPAIRMENT_FLAGS
        .iter()
        .any(|flag| matches.contains_id(flag))
        .then(|| {
            let defaults = Impairments::default();
            let rate = |name: &str, default: f64| {
                matches.get_one::<f64>(name).copied().unwrap_or(default)
            };
            Impairments {
                loss: rate("loss", defaults.loss),
                duplication: rate("duplication", defaults.duplication),
                reordering: rate("reordering", defaults.reordering),
                corruption: rate("corruption", defaults.corruption),
                reorder_delay: matches
                    .get_one::<u64>("reorder-delay")
                    .copied()
                    .unwrap_or(defaults.reorder_delay),
            }
        });

    // Keys not given are generated from the seed, so a run stays reproducible
    let mut rng = StdRng::seed_from_u64(seed);
    let mut key = |name: &str| match matches.get_one::<String>(name) {
        Some(hex) => parse_key(hex),
        None => Ok(generate_key(&mut rng).to_vec()),
    };
    let integrity_key = key("integrity-key")?;
    let ciphering_key = key("ciphering-key")?;
    let direction = match matches.get_one::<String>("direction").map(String::as_str) {
        Some("downlink") => Direction::Downlink,
        _ => Direction::Uplink,
    };

    let defaults = Config::default();
    Ok(Config {
        sdu_count,
        tamper,
        impairments,
        security: SecurityConfig {
            integrity_key,
            ciphering_key,
            bearer: matches.get_one::<u8>("bearer").copied().unwrap_or(1),
            direction,
        },
        window_size: matches.get_one::<u32>("window").copied(),
        sn_bits: matches
            .get_one::<u8>("sn-bits")
            .copied()
            .unwrap_or(defaults.sn_bits),
        t_reordering: matches
            .get_one::<u64>("t-reordering")
            .copied()
            .unwrap_or(defaults.t_reordering),
        seed,
        drain: !matches.get_flag("no-drain"),
        sample_interval: matches.get_one::<u64>("sample-interval").copied(),
    })
}
