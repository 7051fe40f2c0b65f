//! Cribwork CLI
//!
//! Encrypt, decrypt and crack classical ciphers from the command line.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cribwork_config::CribworkConfig;
use cribwork_engine::rotor::{decrypt_message, encrypt_message};
use cribwork_engine::{
    Cipher, CipherKind, CrackOutcome, FitnessModel, FrequencyScorer, MachineConfig, NgramScorer,
    PeriodicKeyAnalyzer, Registry,
};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";

#[derive(Parser)]
#[command(name = "crib")]
#[command(about = "Cribwork - classical cipher cryptanalysis")]
#[command(version)]
struct Cli {
    /// Config file (default: $CRIBWORK_CONFIG, then ~/.config/cribwork/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover plaintext and key from ciphertext
    Crack {
        /// Cipher: caesar, vigenere, enigma, playfair, railfence, substitution, otp
        #[arg(short, long)]
        cipher: CipherKind,

        /// Ciphertext (read from --file or stdin when omitted)
        text: Option<String>,

        /// Read ciphertext from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Rotor search workers (rounded down to a divisor of 60)
        #[arg(long)]
        workers: Option<usize>,

        /// Seed for the annealing searches
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Encrypt with a known key
    Encrypt {
        #[command(flatten)]
        cipher: CipherArgs,
    },

    /// Decrypt with a known key
    Decrypt {
        #[command(flatten)]
        cipher: CipherArgs,
    },

    /// Score text against English letter frequencies and the quadgram model
    Score {
        text: Option<String>,

        /// Quadgram model (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Show periodic key length candidates and the recovered key
    Kasiski {
        text: Option<String>,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
struct CipherArgs {
    /// Cipher: caesar, vigenere, enigma, playfair, railfence, substitution, otp
    #[arg(short, long)]
    cipher: CipherKind,

    /// Shift, keyword, password, rail count or pad (not used by enigma)
    #[arg(short, long)]
    key: Option<String>,

    #[command(flatten)]
    rotor: RotorArgs,

    /// Input text (stdin when omitted)
    text: Option<String>,
}

#[derive(Args)]
struct RotorArgs {
    /// Reflector: B or C
    #[arg(long, default_value = "B")]
    reflector: String,

    /// Rotors left to right, e.g. "III II I"
    #[arg(long, default_value = "III II I")]
    rotors: String,

    /// Day key (start letters)
    #[arg(long, default_value = "AAA")]
    day_key: String,

    /// Ring settings
    #[arg(long, default_value = "AAA")]
    rings: String,

    /// Plugboard pairs, e.g. "AB CD EF"
    #[arg(long, default_value = "")]
    plugs: String,

    /// Message key (encrypt only)
    #[arg(long)]
    message_key: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective config
    Show,

    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cribwork=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Crack {
            cipher,
            text,
            file,
            workers,
            seed,
        } => cmd_crack(config_path, cli.json, cipher, read_input(text, file.as_deref())?, workers, seed),
        Commands::Encrypt { cipher } => cmd_transform(cipher, Direction::Encrypt, cli.json),
        Commands::Decrypt { cipher } => cmd_transform(cipher, Direction::Decrypt, cli.json),
        Commands::Score { text, model } => cmd_score(config_path, cli.json, read_input(text, None)?, model),
        Commands::Kasiski { text } => cmd_kasiski(cli.json, read_input(text, None)?),
        Commands::Config { command } => cmd_config(config_path, command),
    }
}

/// Positional text, else the file, else stdin
fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_crack(
    config_path: Option<&Path>,
    json: bool,
    cipher: CipherKind,
    ciphertext: String,
    workers: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = CribworkConfig::resolve(config_path)?;
    if workers.is_some() {
        config.rotor.workers = workers;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;

    let analyst = config.analyst().context("Failed to prepare the cryptanalyst")?;
    let outcome = analyst
        .crack(cipher, &ciphertext)
        .with_context(|| format!("Failed to crack {}", cipher.name()))?;

    if json {
        return print_json(&outcome);
    }

    println!("\n  CRACK ({})", cipher.name().to_uppercase());
    match outcome {
        CrackOutcome::Cracked(result) => {
            println!("  Key:       {}", result.key);
            println!("  Score:     {:.2}", result.score);
            println!("  Plaintext: {}", result.plaintext);
        }
        CrackOutcome::NotCrackable { reason, .. } => {
            println!("  Not crackable: {}", reason);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

fn cmd_transform(args: CipherArgs, direction: Direction, json: bool) -> Result<()> {
    let input = read_input(args.text.clone(), None)?;
    let output = transform(&args, direction, &input)?;

    if json {
        return print_json(&serde_json::json!({
            "cipher": args.cipher,
            "direction": format!("{:?}", direction).to_lowercase(),
            "output": output,
        }));
    }
    println!("{}", output);
    Ok(())
}

fn transform(args: &CipherArgs, direction: Direction, input: &str) -> Result<String> {
    let encrypt = direction == Direction::Encrypt;
    let output = match args.cipher {
        CipherKind::Caesar => {
            let shift: i32 = require_key(args)?
                .trim()
                .parse()
                .context("Caesar key must be an integer shift")?;
            if encrypt {
                Cipher::caesar_encrypt(input, shift)
            } else {
                Cipher::caesar_decrypt(input, shift)
            }
        }
        CipherKind::Vigenere => {
            let key = require_key(args)?;
            if encrypt {
                Cipher::vigenere_encrypt(input, key)?
            } else {
                Cipher::vigenere_decrypt(input, key)?
            }
        }
        CipherKind::Substitution => {
            let key = Cipher::keyword_alphabet(require_key(args)?, LOWERCASE)?;
            if encrypt {
                Cipher::substitution_encrypt(input, LOWERCASE, &key)?
            } else {
                Cipher::substitution_decrypt(input, LOWERCASE, &key)?
            }
        }
        CipherKind::Playfair => {
            let grid = Cipher::playfair_grid(require_key(args)?);
            if encrypt {
                Cipher::playfair_encrypt(input, &grid)?
            } else {
                Cipher::playfair_strip_fillers(&Cipher::playfair_decrypt(input, &grid)?)
            }
        }
        CipherKind::RailFence => {
            let rails: usize = require_key(args)?
                .trim()
                .parse()
                .context("Rail fence key must be a rail count")?;
            if encrypt {
                Cipher::rail_fence_encrypt(input, rails)?
            } else {
                Cipher::rail_fence_decrypt(input, rails)?
            }
        }
        CipherKind::OneTimePad => one_time_pad(require_key(args)?, direction, input)?,
        CipherKind::Enigma => {
            let rotor = &args.rotor;
            let registry = Registry::standard();
            let config = MachineConfig::parse(
                &rotor.reflector,
                &rotor.rotors,
                &rotor.day_key,
                &rotor.rings,
                &rotor.plugs,
            )
            .context("Invalid machine settings")?;
            tracing::debug!(%config, "Machine configured");

            if encrypt {
                let message_key = rotor
                    .message_key
                    .as_deref()
                    .context("--message-key is required to encrypt with enigma")?;
                encrypt_message(&registry, &config, message_key, input)?
            } else {
                let message = decrypt_message(&registry, &config, input)?;
                tracing::info!(message_key = %message.message_key, "Message key recovered");
                message.plaintext
            }
        }
    };
    Ok(output)
}

fn require_key(args: &CipherArgs) -> Result<&str> {
    match args.key.as_deref() {
        Some(key) if !key.is_empty() => Ok(key),
        _ => bail!("--key is required for {}", args.cipher.name()),
    }
}

/// Encryption XORs text with the pad and prints hex; decryption takes hex.
fn one_time_pad(pad: &str, direction: Direction, input: &str) -> Result<String> {
    match direction {
        Direction::Encrypt => {
            if pad.len() < input.len() {
                bail!("Pad is {} bytes but the message is {}", pad.len(), input.len());
            }
            Ok(hex::encode(Cipher::xor(input.as_bytes(), pad.as_bytes())))
        }
        Direction::Decrypt => {
            let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
            let data = hex::decode(&digits).context("Ciphertext must be hex")?;
            if pad.len() < data.len() {
                bail!("Pad is {} bytes but the message is {}", pad.len(), data.len());
            }
            String::from_utf8(Cipher::xor(&data, pad.as_bytes())).context("Decrypted pad output is not UTF-8")
        }
    }
}

fn cmd_score(config_path: Option<&Path>, json: bool, text: String, model: Option<PathBuf>) -> Result<()> {
    let frequency = FrequencyScorer::score_text(&text);

    let model_path = match model {
        Some(path) => Some(path),
        None => CribworkConfig::resolve(config_path)?.models.quadgrams,
    };
    let fitness = match model_path {
        Some(path) => {
            let model = FitnessModel::load(&path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            Some(NgramScorer::new(Arc::new(model)).fitness(&text))
        }
        None => None,
    };

    if json {
        return print_json(&serde_json::json!({
            "frequency": frequency,
            "fitness": fitness,
        }));
    }

    println!("\n  SCORE");
    println!("  Frequency: {:.1} (lower is more English)", frequency);
    match fitness {
        Some(fitness) => println!("  Fitness:   {:.2} (higher is more English)", fitness),
        None => println!("  Fitness:   no quadgram model configured"),
    }
    Ok(())
}

fn cmd_kasiski(json: bool, ciphertext: String) -> Result<()> {
    let candidates = PeriodicKeyAnalyzer::key_length_candidates(&ciphertext);
    let found = PeriodicKeyAnalyzer::crack(&ciphertext);

    if json {
        let lengths: Vec<_> = candidates
            .iter()
            .map(|(sequence_length, factors)| {
                serde_json::json!({ "sequence_length": sequence_length, "key_lengths": factors })
            })
            .collect();
        return print_json(&serde_json::json!({
            "candidates": lengths,
            "key": found.as_ref().ok(),
            "error": found.as_ref().err().map(|e| e.to_string()),
        }));
    }

    println!("\n  KASISKI EXAMINATION");
    for (sequence_length, factors) in &candidates {
        let factors: Vec<String> = factors.iter().map(|f| f.to_string()).collect();
        println!("  Sequences of {}: key lengths [{}]", sequence_length, factors.join(", "));
    }
    let found = found?;
    println!("\n  Key:       {} (from sequences of {})", found.key, found.sequence_length);
    println!("  Score:     {:.2}", found.score);
    println!("  Plaintext: {}", found.plaintext);
    Ok(())
}

fn cmd_config(config_path: Option<&Path>, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = CribworkConfig::resolve(config_path)?;
            print!("{}", config.to_yaml()?);
        }
        ConfigCommands::Init { force } => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(CribworkConfig::default_path);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            CribworkConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cipher: CipherKind, key: Option<&str>) -> CipherArgs {
        CipherArgs {
            cipher,
            key: key.map(str::to_string),
            rotor: RotorArgs {
                reflector: "B".into(),
                rotors: "III II I".into(),
                day_key: "AAA".into(),
                rings: "AAA".into(),
                plugs: String::new(),
                message_key: Some("ABC".into()),
            },
            text: None,
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["crib", "--json", "crack", "-c", "railfence", "WECRL"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Crack { cipher: CipherKind::RailFence, .. }
        ));
        assert!(Cli::try_parse_from(["crib", "crack", "-c", "rot13", "abc"]).is_err());
    }

    #[test]
    fn test_enigma_round_trip() {
        let encrypted = transform(&args(CipherKind::Enigma, None), Direction::Encrypt, "ATTACKATDAWN").unwrap();
        assert_eq!(encrypted, "FUVMNG FLRSSLZBBOTQ");
        let decrypted = transform(&args(CipherKind::Enigma, None), Direction::Decrypt, &encrypted).unwrap();
        assert_eq!(decrypted, "ATTACKATDAWN");
    }

    #[test]
    fn test_keyed_ciphers_round_trip() {
        let cases = [
            (CipherKind::Caesar, "7"),
            (CipherKind::Vigenere, "lemon"),
            (CipherKind::Substitution, "zebra"),
            (CipherKind::RailFence, "3"),
        ];
        for (cipher, key) in cases {
            let a = args(cipher, Some(key));
            let text = "we are discovered flee at once";
            let encrypted = transform(&a, Direction::Encrypt, text).unwrap();
            assert_ne!(encrypted, text);
            assert_eq!(transform(&a, Direction::Decrypt, &encrypted).unwrap(), text, "{}", cipher);
        }

        // Playfair drops spacing and case
        let a = args(CipherKind::Playfair, Some("monarchy"));
        let encrypted = transform(&a, Direction::Encrypt, "attack at dawn").unwrap();
        assert_eq!(encrypted, "RSSRDERSBRNY");
        assert_eq!(transform(&a, Direction::Decrypt, &encrypted).unwrap(), "ATTACKATDAWN");
    }

    #[test]
    fn test_missing_key() {
        assert!(transform(&args(CipherKind::Caesar, None), Direction::Encrypt, "abc").is_err());
        assert!(transform(&args(CipherKind::Caesar, Some("x")), Direction::Encrypt, "abc").is_err());
    }

    #[test]
    fn test_one_time_pad() {
        let encrypted = one_time_pad("XMCKL", Direction::Encrypt, "HELLO").unwrap();
        assert_eq!(encrypted, "10080f0703");
        assert_eq!(one_time_pad("XMCKL", Direction::Decrypt, &encrypted).unwrap(), "HELLO");
        assert!(one_time_pad("XM", Direction::Encrypt, "HELLO").is_err());
        assert!(one_time_pad("XMCKL", Direction::Decrypt, "abc").is_err());
        assert!(one_time_pad("XMCKL", Direction::Decrypt, "zz").is_err());
    }
}
