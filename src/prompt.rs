use std::io::{BufRead, Write as _};

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::form::{Field, FieldErrors, FormSource, RegistrationInput};
use crate::messages::BeaconIdentity;

fn print_identity(identity: &BeaconIdentity) {
    println!();
    println!("Beacon identified");
    println!("  UUID   {}", identity.uuid);
    println!("  Major  {}", identity.major);
    println!("  Minor  {}", identity.minor);
    println!();
}

fn print_errors(errors: &FieldErrors) {
    for (field, message) in errors.iter() {
        eprintln!("  {}: {}", field.as_str(), message);
    }
}

/// Interactive form. End of input means the user went back.
///
/// Lines are read on a detached thread so a pending read never holds up
/// runtime shutdown.
pub struct PromptForm {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl PromptForm {
    pub fn new() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        });
        PromptForm { lines: rx }
    }

    async fn ask(&mut self, label: &str) -> Option<String> {
        print!("{label}: ");
        let _ = std::io::stdout().flush();
        match self.lines.recv().await? {
            Ok(line) => Some(line),
            Err(err) => {
                warn!("Unable to read input: {}", err);
                None
            }
        }
    }
}

impl FormSource for PromptForm {
    async fn fill(
        &mut self,
        identity: &BeaconIdentity,
        errors: &FieldErrors,
    ) -> Option<RegistrationInput> {
        if errors.is_empty() {
            print_identity(identity);
        }

        if let Some(message) = errors.get(Field::BeaconAlias) {
            eprintln!("  {message}");
        }
        let beacon_alias = self.ask("Beacon alias").await?;

        if let Some(message) = errors.get(Field::DistanceToAlert) {
            eprintln!("  {message}");
        }
        let distance_to_alert = self.ask("Alert distance (meters)").await?;
        Some(RegistrationInput {
            beacon_alias,
            distance_to_alert,
        })
    }

    fn alert(&mut self, title: &str, message: &str) {
        eprintln!();
        eprintln!("{title}");
        eprintln!("{message}");
    }
}

/// One-shot form filled from command-line flags.
pub struct ArgsForm {
    input: Option<RegistrationInput>,
}

impl ArgsForm {
    pub fn new(beacon_alias: String, distance_to_alert: String) -> Self {
        ArgsForm {
            input: Some(RegistrationInput {
                beacon_alias,
                distance_to_alert,
            }),
        }
    }
}

impl FormSource for ArgsForm {
    async fn fill(
        &mut self,
        identity: &BeaconIdentity,
        errors: &FieldErrors,
    ) -> Option<RegistrationInput> {
        if !errors.is_empty() {
            print_errors(errors);
            return None;
        }
        print_identity(identity);
        self.input.take()
    }

    fn alert(&mut self, title: &str, message: &str) {
        eprintln!("{title}: {message}");
    }
}
