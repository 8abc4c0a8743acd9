//! Command line front end for Kramar.
//!
//! Parsing lives in [`Cli`]; [`run`] executes a parsed command against the
//! SQLite store and writes human-readable output to the given writer.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use kramar_ai::{
    generator_for, ActivityInput, AiConfig, Artifact, CheckInSummary, HealthGenerator,
    HealthPlanInput, Provider, RecipeInput, FALLBACK_MOTIVATION,
};
use kramar_storage::{Collection, PersistentStore, SqliteStore, StoreExt, VersionTracker};
use kramar_sync::{
    HuggingConfig, HuggingSession, PartnerMerge, PlatformCapabilities, SimulatedExchange,
    SyncNegotiation, TransportKind,
};
use kramar_types::{
    ActivityLog, DailyCheckIn, FoodList, HealthPlan, RecipeBook, SyncPayload, SyncSelection,
    UserId, UserProfile,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Kramar: a couples health planner.
#[derive(Parser, Debug)]
#[command(name = "kramar", about = "Kramar health planner", version)]
pub struct Cli {
    /// Path to the SQLite database.
    #[arg(long, env = "KRAMAR_DB", default_value = "kramar.db")]
    pub db: PathBuf,

    /// Name this device advertises to partners.
    #[arg(long, env = "KRAMAR_DEVICE_NAME", default_value = "Kramar")]
    pub device_name: String,

    /// Enable verbose logging.
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enter hugging mode and sync with a nearby partner.
    Hug(HugArgs),
    /// List partners with stored data.
    Partners,
    /// Check whether the app was updated since the last run.
    Version(VersionArgs),
    /// Set up or show a user profile.
    Profile {
        #[command(subcommand)]
        what: ProfileCommand,
    },
    /// Replace or show a user's food lists.
    FoodList {
        #[command(subcommand)]
        what: FoodListCommand,
    },
    /// Record today's mood and energy.
    CheckIn(CheckInArgs),
    /// Generate content with the AI assistant.
    Generate {
        #[command(subcommand)]
        what: GenerateCommand,
    },
}

#[derive(clap::Args, Debug)]
pub struct HugArgs {
    /// Local user id.
    #[arg(long)]
    pub user: String,

    /// The device has touch input; enables the simulated fallback.
    #[arg(long)]
    pub touch: bool,

    /// Categories to send, comma separated. Defaults to everything available.
    #[arg(long)]
    pub send: Option<String>,

    /// Categories to accept, comma separated. Defaults to everything.
    #[arg(long)]
    pub receive: Option<String>,

    /// Partner name reported by the simulated fallback.
    #[arg(long, default_value = "Partner")]
    pub partner_name: String,

    /// JSON payload the simulated partner sends.
    #[arg(long)]
    pub partner_file: Option<PathBuf>,

    /// Simulated pairing delay in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub fallback_delay_ms: u64,

    /// Give up connecting after this many seconds.
    #[arg(long)]
    pub connect_timeout: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct VersionArgs {
    /// The running app version.
    #[arg(long)]
    pub current: String,

    #[arg(long, default_value = "")]
    pub build_date: String,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Create or replace a profile.
    Set(ProfileArgs),
    /// Print a stored profile as JSON.
    Show {
        #[arg(long)]
        user: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct ProfileArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub name: String,

    /// Current weight in kg.
    #[arg(long)]
    pub weight: f64,

    /// Target weight in kg.
    #[arg(long)]
    pub target_weight: f64,

    /// Height in cm.
    #[arg(long)]
    pub height: f64,

    #[arg(long)]
    pub age: u32,

    /// Goals, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub goals: Vec<String>,

    /// Lifestyle traits, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub lifestyle: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum FoodListCommand {
    /// Replace the three lists.
    Set {
        #[arg(long)]
        user: String,
        /// Foods you love, comma separated.
        #[arg(long, value_delimiter = ',')]
        yes: Vec<String>,
        /// Foods you avoid, comma separated.
        #[arg(long, value_delimiter = ',')]
        no: Vec<String>,
        /// Foods you eat now and then, comma separated.
        #[arg(long, value_delimiter = ',')]
        sometimes: Vec<String>,
    },
    /// Print the stored lists.
    Show {
        #[arg(long)]
        user: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct CheckInArgs {
    #[arg(long)]
    pub user: String,

    /// Mood from 1 to 10.
    #[arg(long)]
    pub mood: u8,

    /// Energy from 1 to 10.
    #[arg(long)]
    pub energy: u8,

    /// Weight in kg.
    #[arg(long)]
    pub weight: Option<f64>,

    #[arg(long, default_value = "")]
    pub notes: String,

    /// What you did today, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub activities: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum GenerateCommand {
    /// Generate and store a health plan.
    Plan {
        #[arg(long)]
        user: String,
        /// Include a partner's profile in the plan.
        #[arg(long)]
        partner: Option<String>,
        #[command(flatten)]
        ai: AiArgs,
    },
    /// Generate a motivational message from the latest check-in.
    Motivation {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        ai: AiArgs,
    },
    /// Generate a recipe from the food lists, or from a link, and store it.
    Recipe {
        #[arg(long)]
        user: String,
        /// Structure the recipe found at this URL instead.
        #[arg(long)]
        link: Option<String>,
        #[command(flatten)]
        ai: AiArgs,
    },
    /// Generate new activity suggestions and store them.
    Activities {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        ai: AiArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct AiArgs {
    /// Generation API: claude or openai.
    #[arg(long, env = "KRAMAR_AI_PROVIDER", default_value = "claude")]
    pub provider: Provider,

    /// API key. Defaults to CLAUDE_API_KEY or OPENAI_API_KEY per provider.
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long, env = kramar_ai::BASE_URL_ENV)]
    pub ai_base_url: Option<String>,
}

impl AiArgs {
    fn generator(&self) -> Result<Box<dyn HealthGenerator>> {
        Ok(generator_for(self.provider, self.config())?)
    }

    fn config(&self) -> AiConfig {
        let mut config = AiConfig::from_env_for(self.provider);
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(url) = &self.ai_base_url {
            config.base_url = url.clone();
        }
        config
    }
}

/// Executes a parsed command.
pub async fn run(cli: Cli, out: &mut (dyn Write + Send)) -> Result<()> {
    let store = open_store(&cli.db).await?;
    match cli.command {
        Command::Hug(args) => hug(store, &cli.device_name, args, out).await,
        Command::Partners => partners(store, out).await,
        Command::Version(args) => version(store, args, out).await,
        Command::Profile { what } => profile(store, what, out).await,
        Command::FoodList { what } => food_list(store, what, out).await,
        Command::CheckIn(args) => check_in(store, args, out).await,
        Command::Generate { what } => generate(store, what, out).await,
    }
}

async fn open_store(path: &PathBuf) -> Result<Arc<dyn PersistentStore>> {
    let store = SqliteStore::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    store.init().await.context("failed to initialize database")?;
    Ok(Arc::new(store))
}

// ── hug ─────────────────────────────────────────────────────────

async fn hug(
    store: Arc<dyn PersistentStore>,
    device_name: &str,
    args: HugArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let user = UserId::parse(&args.user).context("invalid --user")?;
    let mut negotiation = SyncNegotiation::prepare(store.as_ref(), user, device_name).await?;
    writeln!(out, "Available to send: {}", negotiation.local().available())?;

    let outgoing = match &args.send {
        Some(list) => SyncSelection::parse_list(list)?,
        None => negotiation.local().available(),
    };
    let incoming = match &args.receive {
        Some(list) => SyncSelection::parse_list(list)?,
        None => SyncSelection::all(),
    };
    negotiation.select_outgoing(outgoing)?;
    negotiation.select_incoming(incoming)?;
    if !negotiation.can_start() {
        bail!("select at least one category to send or receive");
    }

    let config = HuggingConfig {
        device_name: device_name.to_string(),
        fallback_delay: Duration::from_millis(args.fallback_delay_ms),
        connect_timeout: args.connect_timeout.map(Duration::from_secs),
        ..Default::default()
    };
    let (caps, central) = platform(args.touch).await;
    let session = HuggingSession::new(caps, central, config);

    let kind = session.enter().await?;
    writeln!(out, "Connected ({})", describe(kind))?;

    let result = match kind {
        TransportKind::NativeBle => {
            let exchange = session.gatt_exchange().await?;
            negotiation.exchange(&session, &exchange).await.cloned()
        }
        TransportKind::SimulatedFallback => {
            let exchange = simulated_exchange(&args)?;
            negotiation.exchange(&session, &exchange).await.cloned()
        }
    };
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            let _ = session.exit().await;
            return Err(e.into());
        }
    };

    writeln!(out, "Partner: {}", summary.partner)?;
    writeln!(out, "Sent: {}", summary.sent)?;
    writeln!(out, "Received: {}", summary.received)?;

    let outcome = negotiation.confirm(&PartnerMerge::new(store)).await?;
    session.exit().await?;

    if outcome.report.is_complete() {
        writeln!(out, "Saved {} categories", outcome.report.written.len())?;
    } else {
        for (category, reason) in &outcome.report.failed {
            writeln!(out, "Failed to save {category}: {reason}")?;
        }
        bail!("some partner data could not be saved");
    }
    Ok(())
}

fn simulated_exchange(args: &HugArgs) -> Result<SimulatedExchange> {
    let mut exchange = SimulatedExchange::new(args.partner_name.clone());
    if let Some(path) = &args.partner_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let payload: SyncPayload =
            serde_json::from_str(&raw).context("partner file is not a sync payload")?;
        exchange = exchange.with_partner_payload(payload);
    }
    Ok(exchange)
}

fn describe(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::NativeBle => "bluetooth",
        TransportKind::SimulatedFallback => "simulated",
    }
}

#[cfg(feature = "native-ble")]
async fn platform(
    touch: bool,
) -> (PlatformCapabilities, Option<Arc<dyn kramar_sync::BleCentral>>) {
    use kramar_sync::ble::{detect_capabilities, BtleplugCentral};

    let mut caps = detect_capabilities(touch).await;
    if !caps.native_bluetooth {
        return (caps, None);
    }
    match BtleplugCentral::new().await {
        Ok(central) => (caps, Some(Arc::new(central) as Arc<dyn kramar_sync::BleCentral>)),
        Err(e) => {
            warn!(error = %e, "bluetooth adapter unavailable");
            caps.native_bluetooth = false;
            (caps, None)
        }
    }
}

#[cfg(not(feature = "native-ble"))]
async fn platform(
    touch: bool,
) -> (PlatformCapabilities, Option<Arc<dyn kramar_sync::BleCentral>>) {
    let caps = PlatformCapabilities {
        native_bluetooth: false,
        touch_input: touch,
    };
    (caps, None)
}

// ── partners ────────────────────────────────────────────────────

async fn partners(store: Arc<dyn PersistentStore>, out: &mut (dyn Write + Send)) -> Result<()> {
    let merge = PartnerMerge::new(store);
    let ids = merge.list_partners().await?;
    if ids.is_empty() {
        writeln!(out, "No partner data stored")?;
        return Ok(());
    }
    for id in ids {
        let stored = merge.stored(&id).await?;
        let name = stored
            .profile
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("-");
        writeln!(out, "{id}\t{name}\t{}", stored.categories())?;
    }
    Ok(())
}

// ── version ─────────────────────────────────────────────────────

async fn version(
    store: Arc<dyn PersistentStore>,
    args: VersionArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let tracker = VersionTracker::new(store);
    let previous = tracker.stored().await.map(|v| v.version);
    if tracker
        .check_for_update(&args.current, &args.build_date)
        .await?
    {
        let from = previous.unwrap_or_default();
        info!(from = %from, to = %args.current, "update detected");
        writeln!(out, "Updated from {from} to {}", args.current)?;
    } else {
        writeln!(out, "Up to date ({})", args.current)?;
    }
    Ok(())
}

// ── profile ─────────────────────────────────────────────────────

async fn profile(
    store: Arc<dyn PersistentStore>,
    what: ProfileCommand,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match what {
        ProfileCommand::Set(args) => {
            let user = UserId::parse(&args.user).context("invalid --user")?;
            let existing: Option<UserProfile> = store
                .get_record(Collection::UserProfiles, user.as_str())
                .await?;
            let profile = UserProfile {
                id: user.as_str().to_string(),
                name: args.name.trim().to_string(),
                current_weight: args.weight,
                target_weight: args.target_weight,
                height: args.height,
                age: args.age,
                goals: items(args.goals),
                lifestyle: items(args.lifestyle),
                has_seen_tutorial: existing.and_then(|p| p.has_seen_tutorial),
            };
            profile.validate()?;
            store
                .store_record(Collection::UserProfiles, &profile)
                .await?;
            writeln!(out, "Saved profile for {}", profile.name)?;
        }
        ProfileCommand::Show { user } => {
            let profile = load_profile(store.as_ref(), Collection::UserProfiles, &user).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&profile)?)?;
        }
    }
    Ok(())
}

/// Trimmed entries, blanks dropped.
fn items(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

// ── food lists ──────────────────────────────────────────────────

async fn food_list(
    store: Arc<dyn PersistentStore>,
    what: FoodListCommand,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match what {
        FoodListCommand::Set {
            user,
            yes,
            no,
            sometimes,
        } => {
            let user = UserId::parse(&user).context("invalid --user")?;
            let list = FoodList {
                user_id: user.as_str().to_string(),
                yes: items(yes),
                no: items(no),
                sometimes: items(sometimes),
            };
            store.store_record(Collection::FoodLists, &list).await?;
            writeln!(
                out,
                "Saved food lists: {} yes, {} no, {} sometimes",
                list.yes.len(),
                list.no.len(),
                list.sometimes.len()
            )?;
        }
        FoodListCommand::Show { user } => {
            let list: Option<FoodList> = store.get_record(Collection::FoodLists, &user).await?;
            let list = list.with_context(|| format!("no food lists stored for {user}"))?;
            writeln!(out, "Yes: {}", list.yes.join(", "))?;
            writeln!(out, "No: {}", list.no.join(", "))?;
            writeln!(out, "Sometimes: {}", list.sometimes.join(", "))?;
        }
    }
    Ok(())
}

// ── check-in ────────────────────────────────────────────────────

async fn check_in(
    store: Arc<dyn PersistentStore>,
    args: CheckInArgs,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let user = UserId::parse(&args.user).context("invalid --user")?;
    let mut check_in = DailyCheckIn::new(user.as_str(), Utc::now(), args.mood, args.energy)?;
    check_in.weight = args.weight;
    check_in.notes = args.notes.trim().to_string();
    check_in.activities = items(args.activities);
    store
        .store_record(Collection::DailyCheckIns, &check_in)
        .await?;
    writeln!(
        out,
        "Check-in saved: mood {}/10, energy {}/10",
        check_in.mood, check_in.energy
    )?;
    Ok(())
}

// ── generate ────────────────────────────────────────────────────

async fn generate(
    store: Arc<dyn PersistentStore>,
    what: GenerateCommand,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match what {
        GenerateCommand::Plan { user, partner, ai } => {
            let client = ai.generator()?;
            let profile = load_profile(store.as_ref(), Collection::UserProfiles, &user).await?;
            let partner = match partner {
                Some(id) => {
                    Some(load_profile(store.as_ref(), Collection::PartnerProfiles, &id).await?)
                }
                None => None,
            };
            let input = HealthPlanInput {
                user: profile,
                partner,
            };
            let text = match client.health_plan(&input).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "health plan generation failed");
                    bail!(e.user_message(Artifact::HealthPlan));
                }
            };
            let plan = HealthPlan::new(user, text);
            store.store_record(Collection::HealthPlans, &plan).await?;
            writeln!(out, "{}", plan.plan)?;
        }
        GenerateCommand::Motivation { user, ai } => {
            let client = ai.generator()?;
            let check_ins: Vec<DailyCheckIn> =
                store.get_all_records(Collection::DailyCheckIns).await?;
            let Some(latest) = check_ins
                .iter()
                .filter(|c| c.user_id == user)
                .max_by_key(|c| c.date)
            else {
                bail!("no check-ins stored for {user}");
            };
            let message = client
                .motivational_message(&CheckInSummary::from(latest))
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "motivational message failed, using fallback");
                    FALLBACK_MOTIVATION.to_string()
                });
            writeln!(out, "{message}")?;
        }
        GenerateCommand::Recipe { user, link, ai } => {
            let client = ai.generator()?;
            let input = match link {
                Some(url) => RecipeInput::FromLink(url),
                None => {
                    let list: Option<FoodList> =
                        store.get_record(Collection::FoodLists, &user).await?;
                    match list.filter(FoodList::has_entries) {
                        Some(list) => RecipeInput::FromPreferences(list),
                        None => bail!("no food lists stored for {user}; run `food-list set` first"),
                    }
                }
            };
            let data = match client.recipe(&input).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "recipe generation failed");
                    bail!(e.user_message(Artifact::Recipe));
                }
            };
            let recipe = data.into_recipe(&user, &input);

            let book: Option<RecipeBook> = store.get_record(Collection::Recipes, &user).await?;
            let mut book = book.unwrap_or_else(|| RecipeBook {
                user_id: user.clone(),
                recipes: Vec::new(),
            });
            writeln!(out, "{} ({})", recipe.title, recipe.cooking_time)?;
            for ingredient in &recipe.ingredients {
                writeln!(out, "- {ingredient}")?;
            }
            book.recipes.push(recipe);
            store.store_record(Collection::Recipes, &book).await?;
            info!(user = %user, recipes = book.recipes.len(), "recipe stored");
        }
        GenerateCommand::Activities { user, ai } => {
            let client = ai.generator()?;
            let profile = load_profile(store.as_ref(), Collection::UserProfiles, &user).await?;
            let log: Option<ActivityLog> = store.get_record(Collection::Activities, &user).await?;
            let mut log = log.unwrap_or_else(|| ActivityLog {
                user_id: user.clone(),
                activities: Vec::new(),
            });
            let input = ActivityInput {
                user: profile,
                existing: log.activities.iter().map(|a| a.name.clone()).collect(),
            };
            let suggestions = match client.activity_suggestions(&input).await {
                Ok(suggestions) => suggestions,
                Err(e) => {
                    warn!(error = %e, "activity suggestions failed");
                    bail!(e.user_message(Artifact::ActivitySuggestions));
                }
            };
            for suggestion in suggestions {
                let activity = suggestion.into_activity(&user);
                writeln!(
                    out,
                    "{} ({}, {})",
                    activity.name,
                    activity.duration,
                    activity.difficulty.label()
                )?;
                log.activities.push(activity);
            }
            store.store_record(Collection::Activities, &log).await?;
        }
    }
    Ok(())
}

async fn load_profile(
    store: &dyn PersistentStore,
    collection: Collection,
    id: &str,
) -> Result<UserProfile> {
    let profile: Option<UserProfile> = store.get_record(collection, id).await?;
    profile.with_context(|| format!("no profile stored for {id}"))
}
