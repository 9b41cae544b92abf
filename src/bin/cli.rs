use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use extuser::{
    config::Settings,
    db,
    models::user::User,
    services::{
        confirmation_service::ConfirmationError,
        create_email_service,
        user_service::{CreateUserRequest, UpdatePasswordRequest},
    },
    AppState,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "extuser-cli")]
#[command(about = "CLI tool for managing accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Username (letters, digits and @/./+/-/_)
        #[arg(short, long)]
        username: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Create the account already confirmed and active
        #[arg(long)]
        confirmed: bool,

        #[arg(long)]
        staff: bool,

        #[arg(long)]
        superuser: bool,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete a user
    Delete {
        #[arg(short, long)]
        email: String,
    },

    /// Confirm a user's email without an activation key
    Confirm {
        #[arg(short, long)]
        email: String,
    },

    /// Send a fresh activation link
    Resend {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

fn get_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    rpassword::read_password().context("failed to read password")
}

fn password_pair(given: Option<String>, prompt: &str) -> anyhow::Result<(String, String)> {
    match given {
        Some(pw) => Ok((pw.clone(), pw)),
        None => {
            let password = get_password(prompt)?;
            let confirm = get_password("Confirm password")?;
            Ok((password, confirm))
        }
    }
}

async fn find_user(state: &AppState, email: &str) -> anyhow::Result<User> {
    match state.user_service.find_user_by_email(email).await? {
        Some(user) => Ok(user),
        None => bail!("User '{}' not found", email),
    }
}

async fn run(state: AppState, command: UserCommands) -> anyhow::Result<()> {
    match command {
        UserCommands::Create {
            email,
            username,
            password,
            confirmed,
            staff,
            superuser,
        } => {
            let (password, password_confirm) = password_pair(password, "Password")?;

            let request = CreateUserRequest {
                email,
                username,
                password,
                password_confirm: Some(password_confirm),
                confirmed,
                is_staff: staff,
                is_superuser: superuser,
                ..Default::default()
            };

            let user = state
                .user_service
                .create_user(request)
                .await
                .context("Failed to create user")?;

            println!("✅ User created successfully!");
            println!("  ID: {}", user.id);
            println!("  Email: {}", user.email);
            println!("  Username: {}", user.username);
            println!("  Confirmed: {}", user.is_confirm);

            if !user.is_confirm {
                match state.confirmation_service.issue(&user).await {
                    Ok(_) => println!("📧 Activation link sent to {}", user.email),
                    Err(ConfirmationError::SiteNotConfigured) => {
                        println!("ℹ️  SITE_DOMAIN not set; no activation link was sent")
                    }
                    Err(e) => return Err(e).context("Failed to issue activation link"),
                }
            }
        }

        UserCommands::List {
            limit,
            offset,
            json,
        } => {
            let users = state
                .user_service
                .list_users(Some(limit), Some(offset))
                .await
                .context("Failed to list users")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else if users.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<5} {:<32} {:<20} {:<10} {:<20}",
                    "ID", "Email", "Username", "Confirmed", "Joined"
                );
                println!("{}", "-".repeat(90));
                for user in users {
                    println!(
                        "{:<5} {:<32} {:<20} {:<10} {:<20}",
                        user.id,
                        user.email,
                        user.username,
                        if user.is_confirm { "Yes" } else { "No" },
                        user.date_joined.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        UserCommands::Delete { email } => {
            let user = find_user(&state, &email).await?;
            state
                .user_service
                .delete_user(user.id)
                .await
                .context("Failed to delete user")?;
            println!("✅ User '{}' deleted successfully!", email);
        }

        UserCommands::Confirm { email } => {
            let user = find_user(&state, &email).await?;
            if user.is_confirm {
                println!("ℹ️  User '{}' is already confirmed", email);
            } else {
                state
                    .user_service
                    .activate_user(user.id)
                    .await
                    .context("Failed to confirm user")?;
                println!("✅ User '{}' confirmed successfully!", email);
            }
        }

        UserCommands::Resend { email } => {
            let user = find_user(&state, &email).await?;
            match state.confirmation_service.resend(&user).await {
                Ok(_) => println!("📧 Activation link sent to {}", email),
                Err(ConfirmationError::AlreadyConfirmed) => {
                    println!("ℹ️  User '{}' is already confirmed", email)
                }
                Err(ConfirmationError::SiteNotConfigured) => {
                    bail!("SITE_DOMAIN is not set; cannot build an activation link")
                }
                Err(e) => return Err(e).context("Failed to resend activation link"),
            }
        }

        UserCommands::SetPassword { email, password } => {
            let user = find_user(&state, &email).await?;
            let (new_password, password_confirm) = password_pair(password, "New password")?;

            state
                .user_service
                .update_password(UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: Some(password_confirm),
                })
                .await
                .context("Failed to update password")?;
            println!("✅ Password updated successfully for '{}'!", email);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let pool = db::create_pool(&settings.database_url).await?;
    db::run_migrations(&pool).await?;

    let email_service = Arc::from(create_email_service(settings.smtp.as_ref()));
    let state = AppState::new(pool, &settings, email_service);

    let Commands::User { command } = cli.command;
    if let Err(err) = run(state, command).await {
        eprintln!("❌ {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
