use std::io::{self, BufRead, Write};
use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use med_domain::{
    form::{parse_dose_time, FormDefaults, MedicineDraft},
    medicine::default_dose_time,
    notifications::{CenterEvent, LocalNotificationCenter},
    Medicine, MedicineService,
};
use tracing::{debug, info};

const HELP: &str = "\
commands:
  add <name> | <dosage> | <quantity> [| <pills per dose> [| HH:MM [| YYYY-MM-DD [| days]]]]
      days is a comma list of weekday indices, 0 = Sunday; empty means every day
  list [--json]          list medicines
  show <n>               show details for entry n
  delete <n>...          delete entries and cancel their reminders
  take <n>               take one dose of entry n
  respond <id>           answer a delivered reminder by notification id
  tick <YYYY-MM-DD> <HH:MM>
                         deliver reminders due at that local time
  pending                list registered reminders
  help | quit";

/// iOS keeps at most 64 pending local notifications per app.
const DEFAULT_PENDING_LIMIT: usize = 64;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) default_dose_time: NaiveTime,
    pub(crate) default_pills_per_dose: NonZeroU32,
    pub(crate) echo_notifications: bool,
    pub(crate) pending_limit: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Builds the config from `lookup`; malformed values keep the default.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("MEDS_DEFAULT_DOSE_TIME") {
            if let Some(time) = parse_dose_time(&raw) {
                config.default_dose_time = time;
            }
        }
        if let Some(raw) = lookup("MEDS_DEFAULT_PILLS_PER_DOSE") {
            if let Ok(value) = raw.trim().parse::<NonZeroU32>() {
                config.default_pills_per_dose = value;
            }
        }
        if let Some(raw) = lookup("MEDS_ECHO_NOTIFICATIONS") {
            match raw.trim() {
                "0" | "false" => config.echo_notifications = false,
                "1" | "true" => config.echo_notifications = true,
                _ => {}
            }
        }
        // 0 lifts the cap.
        if let Some(raw) = lookup("MEDS_PENDING_LIMIT") {
            if let Ok(value) = raw.trim().parse::<usize>() {
                config.pending_limit = (value > 0).then_some(value);
            }
        }
        config
    }

    pub(crate) fn form_defaults(&self, today: NaiveDate) -> FormDefaults {
        FormDefaults {
            pills_per_dose: self.default_pills_per_dose,
            time_per_dose: self.default_dose_time,
            expiration_date: today,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_dose_time: default_dose_time(),
            default_pills_per_dose: NonZeroU32::MIN,
            echo_notifications: true,
            pending_limit: Some(DEFAULT_PENDING_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Add(MedicineDraft),
    List { json: bool },
    Show(usize),
    Delete(Vec<usize>),
    Take(usize),
    Respond(String),
    Tick(chrono::NaiveDateTime),
    Pending,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// Parses a console line. Entry numbers are 1-based as printed by `list`.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match verb {
        "add" => Command::Add(parse_draft(rest)?),
        "list" => Command::List {
            json: rest == "--json",
        },
        "show" => Command::Show(parse_entry(rest)?),
        "delete" => {
            let entries = rest
                .split_whitespace()
                .map(parse_entry)
                .collect::<Result<Vec<_>>>()?;
            if entries.is_empty() {
                bail!("delete needs at least one entry number");
            }
            Command::Delete(entries)
        }
        "take" => Command::Take(parse_entry(rest)?),
        "respond" => {
            if rest.is_empty() {
                bail!("respond needs a notification id");
            }
            Command::Respond(rest.to_string())
        }
        "tick" => {
            let at = chrono::NaiveDateTime::parse_from_str(rest, "%Y-%m-%d %H:%M")
                .with_context(|| format!("`{rest}` is not `YYYY-MM-DD HH:MM`"))?;
            Command::Tick(at)
        }
        "pending" => Command::Pending,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command `{other}`, try `help`"),
    };
    Ok(Some(command))
}

fn parse_entry(raw: &str) -> Result<usize> {
    let number: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("`{}` is not an entry number", raw.trim()))?;
    number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("entry numbers start at 1"))
}

fn parse_draft(raw: &str) -> Result<MedicineDraft> {
    let mut fields = raw.split('|').map(|field| field.trim().to_string());
    let mut next = || fields.next().unwrap_or_default();
    let draft = MedicineDraft {
        name: next(),
        dosage: next(),
        quantity: next(),
        pills_per_dose: next(),
        time_per_dose: next(),
        expiration_date: next(),
        days: next(),
    };
    if draft.name.is_empty() {
        bail!("add needs at least `<name> | <dosage> | <quantity>`");
    }
    Ok(draft)
}

/// Headless stand-in for the list, detail and add-medicine screens.
pub(crate) struct MedicineAppController {
    config: AppConfig,
    service: MedicineService,
    center: Arc<LocalNotificationCenter>,
}

impl MedicineAppController {
    pub(crate) fn new(config: AppConfig, center: Arc<LocalNotificationCenter>) -> Result<Self> {
        let service = MedicineService::builder()
            .with_notification_sink(Box::new(center.clone()))
            .build()
            .context("failed to build medicine service")?;
        Ok(Self {
            config,
            service,
            center,
        })
    }

    pub(crate) fn handle_line(&self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(err) => {
                writeln!(out, "error: {err:#}")?;
                return Ok(Flow::Continue);
            }
        };
        debug!(?command, "console command");
        self.execute(command, out)
    }

    fn execute(&self, command: Command, out: &mut impl Write) -> Result<Flow> {
        match command {
            Command::Add(draft) => {
                let defaults = self.config.form_defaults(Local::now().date_naive());
                match self.service.add_from_draft(&draft, &defaults) {
                    Ok(id) => writeln!(out, "added {} ({id})", draft.name)?,
                    Err(err) => writeln!(out, "not added: {err}")?,
                }
            }
            Command::List { json } => {
                if json {
                    let snapshot = serde_json::to_string_pretty(&self.service.snapshot())
                        .context("failed to serialize medicine snapshot")?;
                    writeln!(out, "{snapshot}")?;
                } else if self.service.is_empty() {
                    writeln!(out, "no medicines")?;
                } else {
                    for (index, medicine) in self.service.medicines().iter().enumerate() {
                        writeln!(out, "{:>3}. {}", index + 1, medicine.list_label())?;
                    }
                }
            }
            Command::Show(index) => match self.service.at(index) {
                Some(medicine) => self.write_detail(&medicine, out)?,
                None => writeln!(out, "no entry {}", index + 1)?,
            },
            Command::Delete(indices) => {
                let removed = self.service.remove(indices);
                for medicine in &removed {
                    writeln!(out, "deleted {}", medicine.list_label())?;
                }
                if removed.is_empty() {
                    writeln!(out, "nothing deleted")?;
                }
            }
            Command::Take(index) => {
                let updated = self
                    .service
                    .at(index)
                    .and_then(|medicine| self.service.take_medicine(medicine.id()));
                match updated {
                    Some(medicine) => {
                        writeln!(out, "{}: {} left", medicine.name, medicine.quantity)?
                    }
                    None => writeln!(out, "no entry {}", index + 1)?,
                }
            }
            Command::Respond(notification_id) => {
                match self.service.on_notification_response(&notification_id) {
                    Some(medicine) => {
                        writeln!(out, "{}: {} left", medicine.name, medicine.quantity)?
                    }
                    None => writeln!(out, "no medicine for notification {notification_id}")?,
                }
            }
            Command::Tick(at) => {
                let due = self.center.due_at(at);
                if due.is_empty() {
                    writeln!(out, "no reminders due at {}", at.format("%Y-%m-%d %H:%M"))?;
                }
                for request in due {
                    let options = self.service.on_delivered(&request.id);
                    let sound = if options.sound { " (sound)" } else { "" };
                    writeln!(
                        out,
                        "reminder{sound}: {} - {} [{}]",
                        request.title, request.body, request.id
                    )?;
                }
            }
            Command::Pending => {
                let pending = self.center.pending();
                if pending.is_empty() {
                    writeln!(out, "no reminders registered")?;
                }
                for request in pending {
                    writeln!(
                        out,
                        "{:02}:{:02} {:<10} {} [{}]",
                        request.trigger.hour,
                        request.trigger.minute,
                        request.trigger.days.label(),
                        request.title,
                        request.id
                    )?;
                }
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn write_detail(&self, medicine: &Medicine, out: &mut impl Write) -> Result<()> {
        let today = Local::now().date_naive();
        writeln!(out, "Medicine Details")?;
        writeln!(out, "  Name: {}", medicine.name)?;
        writeln!(out, "  Dosage: {}", medicine.dosage)?;
        writeln!(out, "  Quantity: {}", medicine.quantity)?;
        writeln!(out, "  Pills per dose: {}", medicine.pills_per_dose)?;
        writeln!(
            out,
            "  Reminder: {} ({})",
            medicine.time_per_dose().format("%H:%M"),
            medicine.selected_days_of_week.label()
        )?;
        let expired = if medicine.is_expired_on(today) {
            " (expired)"
        } else {
            ""
        };
        writeln!(
            out,
            "  Expiration Date: {}{expired}",
            medicine.formatted_expiration()
        )?;
        writeln!(out, "  Notification id: {}", medicine.id())?;
        Ok(())
    }
}

fn build_center(config: &AppConfig) -> Arc<LocalNotificationCenter> {
    let mut center = LocalNotificationCenter::new();
    if let Some(limit) = config.pending_limit {
        center = center.with_limit(limit);
    }
    let center = if config.echo_notifications {
        center.with_listener(|event| match event {
            CenterEvent::Registered(request) => println!(
                "  [notifications] registered {} at {:02}:{:02}",
                request.id, request.trigger.hour, request.trigger.minute
            ),
            CenterEvent::Cancelled(id) => println!("  [notifications] cancelled {id}"),
        })
    } else {
        center
    };
    Arc::new(center)
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(?config, "starting medicine reminder console");
    let center = build_center(&config);
    let controller = MedicineAppController::new(config, center)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "Medicine Reminder - type `help` for commands")?;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read console input")?;
        if controller.handle_line(&line, &mut stdout)? == Flow::Exit {
            break;
        }
        stdout.flush()?;
    }
    info!("medicine reminder console stopped");
    Ok(())
}
