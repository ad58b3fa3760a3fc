use appspark::api::ApiClient;
use appspark::api::models::{Lot, LotId, LotQuery, ReservationId, Role, User};
use appspark::availability::monitor::{
    LotMonitor, RefreshOutcome, refresh_fleet, spawn_periodic_refresh,
};
use appspark::availability::summary::{FleetSummary, SearchSummary, filter_lots};
use appspark::config::{self, Config, ConfigError};
use appspark::error::ClientError;
use appspark::forms::{LoginForm, PasswordChange, ProfileForm, RegisterForm, ReservationForm};
use appspark::routes::Route;
use appspark::session::Session;
use appspark::session::store::FileStore;
use appspark::views;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Command-line client for the AppsPark parking reservation service
#[derive(Parser, Debug)]
#[command(name = "appspark", version)]
struct Cli {
    /// Config file (default: config/config.toml)
    #[arg(long, global = true, env = "APPSPARK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "APPSPARK_PASSWORD")]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Create an account and sign in
    Register {
        #[arg(long)]
        nombre: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
        #[arg(long, value_enum)]
        rol: RoleArg,
    },
    /// Show the signed-in user
    Whoami {
        /// Reload the user from the backend first
        #[arg(long)]
        refresh: bool,
    },
    /// Update name, email or password
    Profile {
        #[arg(long)]
        nombre: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, requires = "new_password")]
        current_password: Option<String>,
        #[arg(long, requires = "current_password")]
        new_password: Option<String>,
        /// Defaults to --new-password
        #[arg(long)]
        confirm_new_password: Option<String>,
    },
    /// Search parking lots
    Lots {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        available: bool,
    },
    /// Show one lot with live availability
    Lot { id: LotId },
    /// Keep refreshing a lot's availability until interrupted
    Watch {
        id: LotId,
        /// Overrides [monitor].refresh_interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Owner overview of every lot
    Dashboard,
    /// Owner: set the stored free-space count of a lot
    SetSpaces { id: LotId, spaces: u32 },
    /// Request a reservation
    Reserve {
        id: LotId,
        #[arg(long)]
        plate: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        start: String,
        /// HH:MM
        #[arg(long)]
        end: String,
    },
    /// List your reservations
    Reservations,
    /// Cancel one of your reservations
    Cancel { id: ReservationId },
    /// Owner: list reservations awaiting a decision
    Pending,
    /// Owner: accept a pending reservation
    Accept { id: ReservationId },
    /// Owner: reject a pending reservation
    Reject { id: ReservationId },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RoleArg {
    Usuario,
    Duenio,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Usuario => Role::Usuario,
            RoleArg::Duenio => Role::Duenio,
        }
    }
}

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Loads the explicit config strictly; a missing default file means defaults.
fn load_config(path: Option<&PathBuf>) -> Result<(Config, bool), ConfigError> {
    match path {
        Some(path) => Ok((config::load_from_path(path)?, false)),
        None => match config::load_default() {
            Ok(config) => Ok((config, false)),
            Err(ConfigError::Read(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok((Config::default(), true))
            }
            Err(err) => Err(err),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, defaulted) = load_config(cli.config.as_ref())?;
    init_tracing(config.log_level());
    if defaulted {
        tracing::warn!(
            config_path = config::DEFAULT_CONFIG_PATH,
            "Config file not found, using defaults"
        );
    }
    tracing::debug!(app = %config.app.name, base_url = config.base_url(), "appspark starting");

    let store = FileStore::new(config.session_path());
    let session = Arc::new(Session::init(Box::new(store)));
    let client = ApiClient::from_config(&config, Arc::clone(&session))?;

    run(cli.command, &client, &config).await?;
    Ok(())
}

async fn run(command: Command, client: &ApiClient, config: &Config) -> Result<(), ClientError> {
    let session = client.session();
    match command {
        Command::Login { email, password } => {
            let landing = client.login(&LoginForm { email, password }).await?;
            if let Some(user) = session.user() {
                println!("Signed in as {} ({})", user.nombre, user.rol);
            }
            println!("Home: {landing}");
        }
        Command::Logout => {
            session.logout()?;
            println!("Signed out");
        }
        Command::Register {
            nombre,
            email,
            confirm_password,
            password,
            rol,
        } => {
            let form = RegisterForm {
                nombre,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                rol: Some(rol.into()),
            };
            let landing = client.register_and_login(&form).await?;
            println!("Account created. Home: {landing}");
        }
        Command::Whoami { refresh } => {
            enter(session, Route::Profile)?;
            let user = if refresh {
                client.refresh_user().await?
            } else {
                session.require_user()?
            };
            println!("{}", views::render_user(&user));
        }
        Command::Profile {
            nombre,
            email,
            current_password,
            new_password,
            confirm_new_password,
        } => {
            enter(session, Route::Profile)?;
            let current = session.require_user()?;
            let password_change = match (current_password, new_password) {
                (Some(current_password), Some(new_password)) => Some(PasswordChange {
                    current_password,
                    confirm_new_password: confirm_new_password
                        .unwrap_or_else(|| new_password.clone()),
                    new_password,
                }),
                _ => None,
            };
            let form = ProfileForm {
                nombre: nombre.unwrap_or(current.nombre),
                email: email.unwrap_or(current.email),
                rol: current.rol,
                password_change,
            };
            let user = client.update_profile(&form).await?;
            println!("Profile updated\n{}", views::render_user(&user));
        }
        Command::Lots {
            search,
            max_price,
            available,
        } => {
            enter(session, Route::HomeUsuario)?;
            let query = LotQuery {
                text: search,
                max_price,
                only_available: available,
            };
            let lots = client.lots(&query).await?;
            let found = filter_lots(&lots, &query);
            println!(
                "{}",
                views::render_lot_list(&found, &SearchSummary::of(&found))
            );
        }
        Command::Lot { id } => {
            let lot = open_lot(client, id).await?;
            let monitor = LotMonitor::new(Arc::new(client.clone()), lot);
            monitor.refresh().await?;
            println!("{}", views::render_lot_detail(&monitor.view()?));
        }
        Command::Watch { id, interval_secs } => {
            let lot = open_lot(client, id).await?;
            let interval = interval_secs
                .map(|secs| std::time::Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.refresh_interval());
            watch_lot(client, lot, interval).await?;
        }
        Command::Dashboard => {
            let user = enter(session, Route::HomeDuenio)?;
            let lots = client.lots_by_owner(user.id).await?;
            let fleet = refresh_fleet(Arc::new(client.clone()), &lots).await?;
            let summary = FleetSummary::from_availability(fleet.iter().map(|e| &e.availability));
            println!("{}", views::render_dashboard(&fleet, &summary));
        }
        Command::SetSpaces { id, spaces } => {
            enter(session, Route::DetailDuenio(id))?;
            let lot = client.update_lot_spaces(id, spaces).await?;
            println!(
                "{}: {}/{} spaces free",
                lot.nombre, lot.espacios_disponibles, lot.espacios_total
            );
        }
        Command::Reserve {
            id,
            plate,
            date,
            start,
            end,
        } => {
            enter(session, Route::Reserva(id))?;
            let form = ReservationForm {
                placa_vehiculo: plate,
                fecha: date,
                hora_inicio: start,
                hora_fin: end,
            };
            if let Err(errors) = form.validate_fields() {
                println!("{}", views::render_validation(&errors));
                return Err(ClientError::Validation(errors));
            }
            let lot = client.lot(id).await?;
            let monitor = LotMonitor::new(Arc::new(client.clone()), lot.clone());
            let reservable_now = match monitor.refresh().await? {
                RefreshOutcome::Applied(availability) => availability.reservable_now,
                RefreshOutcome::Superseded => monitor.view()?.availability.reservable_now,
            };
            if let Err(errors) = form.validate(reservable_now) {
                println!("{}", views::render_validation(&errors));
                return Err(ClientError::Validation(errors));
            }
            println!("{}", views::render_quote(&form, &lot));
            let response = client.create_reservation(id, &form, reservable_now).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Reservation requested".to_string())
            );
        }
        Command::Reservations => {
            let user = enter(session, Route::MisReservas)?;
            let reservations = client.user_reservations(user.id).await?;
            println!("{}", views::render_reservations(&reservations));
        }
        Command::Cancel { id } => {
            enter(session, Route::MisReservas)?;
            let response = client.cancel_reservation(id).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Reservation cancelled".to_string())
            );
        }
        Command::Pending => {
            let user = enter(session, Route::ReservasDuenio)?;
            let reservations = client.pending_reservations(user.id).await?;
            println!("{}", views::render_reservations(&reservations));
        }
        Command::Accept { id } => {
            enter(session, Route::ReservasDuenio)?;
            let response = client.accept_reservation(id).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Reservation accepted".to_string())
            );
        }
        Command::Reject { id } => {
            enter(session, Route::ReservasDuenio)?;
            let response = client.reject_reservation(id).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Reservation rejected".to_string())
            );
        }
    }
    Ok(())
}

/// Navigates to `route`, failing when the guard redirects elsewhere.
fn enter(session: &Session, route: Route) -> Result<User, ClientError> {
    let user = session.user();
    let target = session
        .navigator()
        .navigate_guarded(route.clone(), user.as_ref());
    match user {
        Some(user) if target == route => Ok(user),
        Some(_) => Err(ClientError::Forbidden(route)),
        None => Err(ClientError::NotAuthenticated),
    }
}

/// Opens the detail view matching the user's role.
async fn open_lot(client: &ApiClient, id: LotId) -> Result<Lot, ClientError> {
    let owner = client
        .session()
        .user()
        .is_some_and(|user| user.rol.is_owner());
    let route = if owner {
        Route::DetailDuenio(id)
    } else {
        Route::DetailUsuario(id)
    };
    enter(client.session(), route)?;
    client.lot(id).await
}

async fn watch_lot(
    client: &ApiClient,
    lot: Lot,
    interval: std::time::Duration,
) -> Result<(), ClientError> {
    let monitor = Arc::new(LotMonitor::new(Arc::new(client.clone()), lot));
    let mut views_rx = monitor.subscribe()?;
    let stop = Arc::new(AtomicBool::new(false));
    let mut handle = spawn_periodic_refresh(Arc::clone(&monitor), interval, Arc::clone(&stop));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping refresh");
                break;
            }
            _ = &mut handle => {
                break;
            }
            changed = views_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views_rx.borrow_and_update().clone();
                if !view.loading {
                    println!("{}\n", views::render_lot_detail(&view));
                }
            }
        }
    }

    stop.store(true, Ordering::Relaxed);
    monitor.close();
    if !client.session().is_authenticated() {
        return Err(ClientError::SessionExpired);
    }
    Ok(())
}
