//! Command-line parsing.
//!
//! `dispatch-console <command> [subcommand] [positional...] [--flag value...]`

use crate::domain::{JobId, TechId};
use crate::error::{Error, Result};

pub const USAGE: &str = "\
Usage: dispatch-console <command> [options]

Session:
  login --email EMAIL --password PASSWORD
  register --name NAME --email EMAIL --password PASSWORD
  logout
  whoami

Dashboard:
  overview
  health

Technicians:
  technicians list [--search QUERY]
  technicians show ID
  technicians create --name NAME --email EMAIL --password PASSWORD
  technicians update ID --name NAME --email EMAIL [--password PASSWORD]
  technicians delete ID
  technicians locations
  technicians history ID

Admins:
  admins list
  admins create --name NAME --email EMAIL --password PASSWORD
  admins update ID --name NAME --email EMAIL [--password PASSWORD]
  admins delete ID

Jobs:
  jobs list [--page N]
  jobs show ID
  jobs assign --title TITLE --tech TECH_ID [--description TEXT] [--address TEXT]

Routes:
  routes active
  routes job JOB_ID

Live map:
  watch [--search QUERY] [--tech TECH_ID] [--route JOB_ID]
";

/// Account fields shared by create/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountArgs {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechnicianCommand {
    List { search: Option<String> },
    Show(TechId),
    Create(AccountArgs),
    Update(TechId, AccountArgs),
    Delete(TechId),
    Locations,
    History(TechId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    List,
    Create(AccountArgs),
    Update(String, AccountArgs),
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignArgs {
    pub title: String,
    pub description: String,
    pub address: String,
    pub tech: TechId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCommand {
    List { page: usize },
    Show(JobId),
    Assign(AssignArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCommand {
    Active,
    Job(JobId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub search: Option<String>,
    pub tech: Option<TechId>,
    /// Job whose route path to show
    pub route: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Register(AccountArgs),
    Logout,
    Whoami,
    Overview,
    Health,
    Technicians(TechnicianCommand),
    Admins(AdminCommand),
    Jobs(JobCommand),
    Routes(RouteCommand),
    Watch(WatchOptions),
    Help,
}

impl Command {
    /// Whether the command needs a stored session
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. }
                | Command::Register(_)
                | Command::Logout
                | Command::Health
                | Command::Help
        )
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Invalid {
        message: message.into(),
    }
}

/// Positional words and `--flag value` pairs
struct Args {
    positional: Vec<String>,
    flags: Vec<(String, String)>,
}

impl Args {
    fn split(raw: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = raw.into_iter();

        while let Some(arg) = iter.next() {
            if matches!(arg.as_str(), "-h" | "--help") {
                positional.insert(0, "help".to_string());
                continue;
            }
            match arg.strip_prefix("--") {
                Some(name) if !name.is_empty() => {
                    let (name, value) = match name.split_once('=') {
                        Some((name, value)) => (name.to_string(), value.to_string()),
                        None => {
                            let value = iter
                                .next()
                                .ok_or_else(|| invalid(format!("--{name} needs a value")))?;
                            (name.to_string(), value)
                        }
                    };
                    flags.push((name, value));
                }
                _ => positional.push(arg),
            }
        }
        Ok(Self { positional, flags })
    }

    fn take(&mut self, name: &str) -> Option<String> {
        let index = self.flags.iter().position(|(n, _)| n == name)?;
        Some(self.flags.remove(index).1)
    }

    fn require(&mut self, name: &str) -> Result<String> {
        self.take(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| invalid(format!("--{name} is required")))
    }

    fn positional(&mut self, what: &str) -> Result<String> {
        if self.positional.is_empty() {
            return Err(invalid(format!("missing {what}")));
        }
        Ok(self.positional.remove(0))
    }

    fn account(&mut self, password_required: bool) -> Result<AccountArgs> {
        let name = self.require("name")?;
        let email = self.require("email")?;
        let password = if password_required {
            Some(self.require("password")?)
        } else {
            self.take("password")
        };
        Ok(AccountArgs {
            name,
            email,
            password,
        })
    }

    /// Reject anything left over
    fn finish(self) -> Result<()> {
        if let Some(extra) = self.positional.first() {
            return Err(invalid(format!("unexpected argument `{extra}`")));
        }
        if let Some((name, _)) = self.flags.first() {
            return Err(invalid(format!("unknown option --{name}")));
        }
        Ok(())
    }
}

/// Parse arguments (without the program name)
pub fn parse(raw: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = Args::split(raw)?;
    if args.positional.is_empty() {
        return Ok(Command::Help);
    }

    let command = match args.positional("command")?.as_str() {
        "help" => return Ok(Command::Help),
        "login" => Command::Login {
            email: args.require("email")?,
            password: args.require("password")?,
        },
        "register" => Command::Register(args.account(true)?),
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "overview" => Command::Overview,
        "health" => Command::Health,
        "technicians" | "techs" => Command::Technicians(parse_technicians(&mut args)?),
        "admins" => Command::Admins(parse_admins(&mut args)?),
        "jobs" => Command::Jobs(parse_jobs(&mut args)?),
        "routes" => Command::Routes(parse_routes(&mut args)?),
        "watch" => Command::Watch(WatchOptions {
            search: args.take("search"),
            tech: args.take("tech").map(TechId::from),
            route: args.take("route").map(|id| JobId::from(id.as_str())),
        }),
        other => return Err(invalid(format!("unknown command `{other}`"))),
    };

    args.finish()?;
    Ok(command)
}

fn subcommand(args: &mut Args, default: &str) -> String {
    if args.positional.is_empty() {
        default.to_string()
    } else {
        args.positional.remove(0)
    }
}

fn parse_technicians(args: &mut Args) -> Result<TechnicianCommand> {
    Ok(match subcommand(args, "list").as_str() {
        "list" => TechnicianCommand::List {
            search: args.take("search"),
        },
        "show" => TechnicianCommand::Show(TechId::from(args.positional("technician id")?)),
        "create" => TechnicianCommand::Create(args.account(true)?),
        "update" => {
            let id = TechId::from(args.positional("technician id")?);
            TechnicianCommand::Update(id, args.account(false)?)
        }
        "delete" => TechnicianCommand::Delete(TechId::from(args.positional("technician id")?)),
        "locations" => TechnicianCommand::Locations,
        "history" => TechnicianCommand::History(TechId::from(args.positional("technician id")?)),
        other => return Err(invalid(format!("unknown technicians command `{other}`"))),
    })
}

fn parse_admins(args: &mut Args) -> Result<AdminCommand> {
    Ok(match subcommand(args, "list").as_str() {
        "list" => AdminCommand::List,
        "create" => AdminCommand::Create(args.account(true)?),
        "update" => {
            let id = args.positional("admin id")?;
            AdminCommand::Update(id, args.account(false)?)
        }
        "delete" => AdminCommand::Delete(args.positional("admin id")?),
        other => return Err(invalid(format!("unknown admins command `{other}`"))),
    })
}

fn parse_jobs(args: &mut Args) -> Result<JobCommand> {
    Ok(match subcommand(args, "list").as_str() {
        "list" => {
            let page = match args.take("page") {
                Some(page) => page
                    .parse()
                    .map_err(|_| invalid(format!("--page must be a number, got `{page}`")))?,
                None => 1,
            };
            JobCommand::List { page }
        }
        "show" => JobCommand::Show(JobId::from(args.positional("job id")?.as_str())),
        "assign" => JobCommand::Assign(AssignArgs {
            title: args.require("title")?,
            tech: TechId::from(args.require("tech")?),
            description: args.take("description").unwrap_or_default(),
            address: args.take("address").unwrap_or_default(),
        }),
        other => return Err(invalid(format!("unknown jobs command `{other}`"))),
    })
}

fn parse_routes(args: &mut Args) -> Result<RouteCommand> {
    Ok(match subcommand(args, "active").as_str() {
        "active" => RouteCommand::Active,
        "job" => RouteCommand::Job(JobId::from(args.positional("job id")?.as_str())),
        other => return Err(invalid(format!("unknown routes command `{other}`"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(line: &str) -> Result<Command> {
        parse(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn test_login() {
        assert_eq!(
            parse_str("login --email root@example.com --password=secret").expect("parse"),
            Command::Login {
                email: "root@example.com".into(),
                password: "secret".into(),
            }
        );
        assert!(parse_str("login --email root@example.com").is_err());
    }

    #[test]
    fn test_defaults_and_help() {
        assert_eq!(parse_str("").expect("parse"), Command::Help);
        assert_eq!(parse_str("jobs --help").expect("parse"), Command::Help);
        assert_eq!(
            parse_str("technicians").expect("parse"),
            Command::Technicians(TechnicianCommand::List { search: None })
        );
        assert_eq!(
            parse_str("jobs list --page 3").expect("parse"),
            Command::Jobs(JobCommand::List { page: 3 })
        );
    }

    #[test]
    fn test_update_password_optional() {
        let cmd = parse_str("technicians update t1 --name Karim --email k@example.com").expect("parse");
        assert_eq!(
            cmd,
            Command::Technicians(TechnicianCommand::Update(
                TechId::from("t1"),
                AccountArgs {
                    name: "Karim".into(),
                    email: "k@example.com".into(),
                    password: None,
                }
            ))
        );
        assert!(parse_str("technicians create --name Karim --email k@example.com").is_err());
    }

    #[test]
    fn test_watch_options() {
        let cmd = parse_str("watch --search rahim --route j9").expect("parse");
        assert_eq!(
            cmd,
            Command::Watch(WatchOptions {
                search: Some("rahim".into()),
                tech: None,
                route: Some(JobId::from("j9")),
            })
        );
        assert!(cmd.requires_session());
        assert!(!Command::Health.requires_session());
    }

    #[test]
    fn test_rejects_unknown_input() {
        assert!(parse_str("teleport").is_err());
        assert!(parse_str("jobs list --colour red").is_err());
        assert!(parse_str("whoami extra").is_err());
        assert!(parse_str("jobs list --page two").is_err());
        assert!(parse_str("technicians show").is_err());
    }
}
