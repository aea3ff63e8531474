//! Command execution.

use anyhow::{Context as _, Result, bail};
use chrono::Utc;

use super::cli::{
    AccountArgs, AdminCommand, Command, JobCommand, RouteCommand, TechnicianCommand, USAGE,
};
use super::{live_map, render};
use crate::domain::config::AppConfig;
use crate::domain::{AccountForm, Credentials, NewJob};
use crate::services::{ApiClient, ServiceHub, SessionStore};
use crate::state::{AuthState, DataState};

impl From<AccountArgs> for AccountForm {
    fn from(args: AccountArgs) -> Self {
        AccountForm::new(args.name, args.email, args.password)
    }
}

/// Console context for one invocation
pub struct Console {
    config: AppConfig,
    api: ApiClient,
    auth: AuthState,
    data: DataState,
}

impl Console {
    pub fn new(config: AppConfig, store: SessionStore) -> Result<Self> {
        let auth = AuthState::restore(store).context("Failed to read the stored session")?;
        let mut api = ApiClient::new(&config)?;
        if let Some(token) = auth.token() {
            api.set_token(token);
        }
        Ok(Self {
            config,
            api,
            auth,
            data: DataState::new(),
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        if command.requires_session() && !self.auth.is_authenticated() {
            bail!("Not logged in. Run `dispatch-console login --email EMAIL --password PASSWORD` first.");
        }
        tracing::debug!(?command, "running command");

        let result = self.dispatch(command).await;
        if let Err(e) = &result {
            let auth_failure = e
                .downcast_ref::<crate::error::Error>()
                .is_some_and(crate::error::Error::is_auth_failure);
            if auth_failure {
                return result.context("The session was rejected; log in again");
            }
        }
        result
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        let now = Utc::now();
        match command {
            Command::Help => print!("{USAGE}"),

            Command::Login { email, password } => {
                let admin = self
                    .auth
                    .login(&mut self.api, &Credentials { email, password })
                    .await?;
                println!("Logged in as {} <{}>", admin.name, admin.email);
            }

            Command::Register(args) => {
                let admin = self.auth.register(&mut self.api, &args.into()).await?;
                println!("Registered and logged in as {} <{}>", admin.name, admin.email);
            }

            Command::Logout => {
                self.auth.logout(&mut self.api)?;
                println!("Logged out");
            }

            Command::Whoami => {
                let session = self.auth.require()?;
                println!("{} <{}> (id {})", session.admin.name, session.admin.email, session.admin.id);
                println!("API: {}", self.config.api_url);
            }

            Command::Overview => {
                // A failed load still prints the (empty) dashboard with the error on top
                let loaded = self.data.fetch_all(&self.api).await;
                print!("{}", render::overview(&self.data));
                loaded?;
            }

            Command::Health => {
                let healthy = self.api.health().await;
                println!(
                    "{} is {}",
                    self.config.health_url(),
                    if healthy { "healthy" } else { "unreachable" }
                );
                if !healthy {
                    bail!("Backend health check failed");
                }
            }

            Command::Technicians(cmd) => self.technicians(cmd, now).await?,
            Command::Admins(cmd) => self.admins(cmd).await?,
            Command::Jobs(cmd) => self.jobs(cmd).await?,
            Command::Routes(cmd) => self.routes(cmd).await?,

            Command::Watch(options) => {
                let mut hub = ServiceHub::new(&self.config, self.auth.token().map(str::to_string))?;
                live_map::watch(&mut hub, options, self.config.poll_interval()).await?;
            }
        }
        Ok(())
    }

    async fn technicians(&mut self, cmd: TechnicianCommand, now: chrono::DateTime<Utc>) -> Result<()> {
        match cmd {
            TechnicianCommand::List { search } => {
                self.data.fetch_technicians(&self.api).await?;
                let techs: Vec<_> = self
                    .data
                    .technicians
                    .iter()
                    .filter(|t| search.as_deref().is_none_or(|q| t.matches(q)))
                    .cloned()
                    .collect();
                print!("{}", render::technicians(&techs, now));
            }
            TechnicianCommand::Show(id) => {
                let tech = self.api.get_technician(&id).await?;
                print!("{}", render::technician_detail(&tech, now));
            }
            TechnicianCommand::Create(args) => {
                let tech = self.data.create_technician(&self.api, &args.into()).await?;
                println!("Technician created: {} ({})", tech.display_name(), tech.id);
            }
            TechnicianCommand::Update(id, args) => {
                let tech = self.data.update_technician(&self.api, &id, &args.into()).await?;
                println!("Technician updated: {} ({})", tech.display_name(), tech.id);
            }
            TechnicianCommand::Delete(id) => {
                self.data.delete_technician(&self.api, &id).await?;
                println!("Technician {id} deleted");
            }
            TechnicianCommand::Locations => {
                let techs = self.api.technician_locations().await?;
                print!("{}", render::technicians(&techs, now));
            }
            TechnicianCommand::History(id) => {
                let points = self.api.location_history(&id).await?;
                print!("{}", render::history(&points));
            }
        }
        Ok(())
    }

    async fn admins(&mut self, cmd: AdminCommand) -> Result<()> {
        match cmd {
            AdminCommand::List => {
                self.data.fetch_admins(&self.api).await?;
                print!("{}", render::admins(&self.data.admins));
            }
            AdminCommand::Create(args) => {
                let admin = self.data.create_admin(&self.api, &args.into()).await?;
                println!("Admin created: {} ({})", admin.name, admin.id);
            }
            AdminCommand::Update(id, args) => {
                let admin = self.data.update_admin(&self.api, &id, &args.into()).await?;
                println!("Admin updated: {} ({})", admin.name, admin.id);
            }
            AdminCommand::Delete(id) => {
                if self.auth.admin().is_some_and(|me| me.id == id) {
                    bail!("Refusing to delete the signed-in admin");
                }
                self.data.delete_admin(&self.api, &id).await?;
                println!("Admin {id} deleted");
            }
        }
        Ok(())
    }

    async fn jobs(&mut self, cmd: JobCommand) -> Result<()> {
        match cmd {
            JobCommand::List { page } => {
                self.data.fetch_jobs(&self.api).await?;
                print!("{}", render::jobs_page(&self.data.jobs_page(page)));
            }
            JobCommand::Show(id) => {
                let job = self.api.get_job(&id).await?;
                print!("{}", render::job_detail(&job));
            }
            JobCommand::Assign(args) => {
                let admin_id = self.auth.require()?.admin.id.clone();
                let new_job = NewJob {
                    title: args.title,
                    description: args.description,
                    address: args.address,
                    tech_id: args.tech,
                    admin_id,
                };
                let job = self.data.assign_job(&self.api, &new_job).await?;
                println!("Job assigned: {} ({})", job.title, job.id);
            }
        }
        Ok(())
    }

    async fn routes(&mut self, cmd: RouteCommand) -> Result<()> {
        match cmd {
            RouteCommand::Active => {
                let routes = self.api.active_routes().await?;
                print!("{}", render::routes(&routes));
            }
            RouteCommand::Job(job) => {
                let job_route = self.api.job_route(&job).await?;
                if let Some(route) = &job_route.route {
                    print!("{}", render::routes(std::slice::from_ref(route)));
                }
                print!("{}", render::history(job_route.location_history.as_deref().unwrap_or_default()));
            }
        }
        Ok(())
    }
}

/// Run one command with the platform session store
pub async fn run(command: Command, config: AppConfig) -> Result<()> {
    let store = SessionStore::open_default()?;
    Console::new(config, store)?.run(command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_required() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at(dir.path().join("session.toml"));
        let mut console = Console::new(AppConfig::default(), store).expect("console");

        let err = console.run(Command::Overview).await.expect_err("signed out");
        assert!(err.to_string().starts_with("Not logged in"));
        console.run(Command::Help).await.expect("help works signed out");
    }

    #[test]
    fn test_account_args_into_form() {
        let form: AccountForm = AccountArgs {
            name: "Sadia".into(),
            email: "sadia@example.com".into(),
            password: Some(String::new()),
        }
        .into();
        assert!(form.password.is_none());
    }
}
