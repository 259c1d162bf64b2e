use crate::checklist::Checklist;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    #[error("invalid project name '{0}': use lowercase letters, digits and hyphens")]
    InvalidName(String),
    #[error("unknown framework '{0}'")]
    UnknownFramework(String),
    #[error("unknown database '{0}'")]
    UnknownDatabase(String),
    #[error("plan has no steps")]
    Empty,
    #[error("failed to read plan file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid plan file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One shell command plus the checklist text shown for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStep {
    pub command: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl PlanStep {
    pub fn new(
        command: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

impl From<String> for PlanStep {
    fn from(command: String) -> Self {
        Self {
            title: command.clone(),
            command,
            description: String::new(),
        }
    }
}

impl From<&str> for PlanStep {
    fn from(command: &str) -> Self {
        Self::from(command.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    NextJs,
    Vue,
    Vite,
    Express,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Framework::React,
        Framework::NextJs,
        Framework::Vue,
        Framework::Vite,
        Framework::Express,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Framework::React => "React",
            Framework::NextJs => "Next.js",
            Framework::Vue => "Vue",
            Framework::Vite => "Vite + React",
            Framework::Express => "Express",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Framework::React => "react",
            Framework::NextJs => "nextjs",
            Framework::Vue => "vue",
            Framework::Vite => "vite",
            Framework::Express => "express",
        }
    }

    fn scaffold_command(self, name: &str) -> String {
        match self {
            Framework::React => format!("npx create-react-app {name}"),
            Framework::NextJs => format!("npx create-next-app@latest {name} --js --eslint --no-tailwind --app --no-src-dir --use-npm"),
            Framework::Vue => format!("npx @vue/cli create --default {name}"),
            Framework::Vite => format!("npm create vite@latest {name} -- --template react"),
            Framework::Express => format!("npx express-generator --no-view {name}"),
        }
    }

    fn source_dir(self) -> &'static str {
        match self {
            Framework::NextJs => "app",
            Framework::Express => "routes",
            _ => "src",
        }
    }

    fn extra_packages(self) -> &'static str {
        match self {
            Framework::React | Framework::Vite => "react-router-dom axios",
            Framework::NextJs => "axios",
            Framework::Vue => "vue-router axios",
            Framework::Express => "cors dotenv",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Framework {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "react" | "cra" => Ok(Framework::React),
            "next" | "nextjs" | "next.js" => Ok(Framework::NextJs),
            "vue" => Ok(Framework::Vue),
            "vite" => Ok(Framework::Vite),
            "express" | "node" => Ok(Framework::Express),
            _ => Err(PlanError::UnknownFramework(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    None,
    PostgreSql,
    MongoDb,
    Sqlite,
    MySql,
}

impl Database {
    pub fn label(self) -> &'static str {
        match self {
            Database::None => "None",
            Database::PostgreSql => "PostgreSQL",
            Database::MongoDb => "MongoDB",
            Database::Sqlite => "SQLite",
            Database::MySql => "MySQL",
        }
    }

    fn driver(self) -> Option<&'static str> {
        match self {
            Database::None => None,
            Database::PostgreSql => Some("pg"),
            Database::MongoDb => Some("mongoose"),
            Database::Sqlite => Some("better-sqlite3"),
            Database::MySql => Some("mysql2"),
        }
    }

    fn env_line(self, name: &str) -> Option<String> {
        match self {
            Database::None => None,
            Database::PostgreSql => Some(format!(
                "DATABASE_URL=postgres://localhost:5432/{}",
                name.replace('-', "_")
            )),
            Database::MongoDb => Some(format!("MONGODB_URI=mongodb://localhost:27017/{name}")),
            Database::Sqlite => Some(format!("DATABASE_FILE=./{name}.db")),
            Database::MySql => Some(format!(
                "DATABASE_URL=mysql://root@localhost:3306/{}",
                name.replace('-', "_")
            )),
        }
    }
}

impl FromStr for Database {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "" | "none" => Ok(Database::None),
            "postgres" | "postgresql" | "pg" => Ok(Database::PostgreSql),
            "mongo" | "mongodb" => Ok(Database::MongoDb),
            "sqlite" => Ok(Database::Sqlite),
            "mysql" => Ok(Database::MySql),
            _ => Err(PlanError::UnknownDatabase(value.to_string())),
        }
    }
}

/// Ordered scaffold steps for a new project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPlan {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_project_name(name: &str) -> Result<(), PlanError> {
    if name.len() > 64 || !name_re().is_match(name) {
        return Err(PlanError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl ProjectPlan {
    /// Build the command sequence for a framework/database selection.
    pub fn new(name: &str, framework: Framework, database: Database) -> Result<Self, PlanError> {
        let name = name.trim();
        validate_project_name(name)?;
        let src = framework.source_dir();

        let mut steps = vec![
            PlanStep::new(
                framework.scaffold_command(name),
                format!("Create {} project", framework.label()),
                format!("Generate the {} starter in ./{name}", framework.label()),
            ),
            PlanStep::new(
                format!("cd {name} && npm install {}", framework.extra_packages()),
                "Install base dependencies",
                format!("Add {} to package.json", framework.extra_packages()),
            ),
            PlanStep::new(
                format!("mkdir -p {name}/{src}/components"),
                "Create components folder",
                "Shared building blocks live here",
            ),
            PlanStep::new(
                format!("mkdir -p {name}/{src}/services"),
                "Create services folder",
                "API clients and data access helpers",
            ),
        ];

        if let Some(driver) = database.driver() {
            steps.push(PlanStep::new(
                format!("cd {name} && npm install {driver}"),
                format!("Install {} driver", database.label()),
                format!("Add the {driver} package"),
            ));
            steps.push(PlanStep::new(
                format!("mkdir -p {name}/{src}/db"),
                "Create database folder",
                format!("Connection setup for {}", database.label()),
            ));
            steps.push(PlanStep::new(
                format!("touch {name}/{src}/db/index.js"),
                "Add database connection module",
                format!("Export a shared {} client", database.label()),
            ));
        }

        let env_command = match database.env_line(name) {
            Some(line) => format!("cd {name} && echo \"{line}\" >> .env"),
            None => format!("touch {name}/.env"),
        };
        steps.push(PlanStep::new(
            env_command,
            "Create environment file",
            "Local settings kept out of version control",
        ));

        Ok(Self {
            name: name.to_string(),
            steps,
        })
    }

    /// Load a custom plan from a TOML file with `name` and `[[steps]]` tables.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let contents = fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, PlanError> {
        let mut plan: ProjectPlan = toml::from_str(contents)?;
        plan.steps.retain(|step| !step.command.trim().is_empty());
        if plan.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for step in &mut plan.steps {
            if step.title.trim().is_empty() {
                step.title = step.command.clone();
            }
        }
        Ok(plan)
    }

    pub fn commands(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.command.clone()).collect()
    }

    /// Fresh checklist for reviewing the plan before it runs.
    pub fn checklist(&self) -> Checklist {
        Checklist::from_steps(&self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn react_with_postgres_plan() {
        let plan = ProjectPlan::new("shop", Framework::React, Database::PostgreSql).unwrap();
        let commands = plan.commands();
        assert_eq!(commands[0], "npx create-react-app shop");
        assert!(commands.contains(&"cd shop && npm install pg".to_string()));
        assert!(commands.contains(&"touch shop/src/db/index.js".to_string()));
        assert!(commands.last().unwrap().contains("DATABASE_URL=postgres://localhost:5432/shop"));
        assert_eq!(plan.checklist().len(), commands.len());
    }

    #[test]
    fn plan_without_database_skips_driver_steps() {
        let plan = ProjectPlan::new("api", Framework::Express, Database::None).unwrap();
        assert!(plan.commands().iter().all(|c| !c.contains("src/db")));
        assert_eq!(plan.commands().last().unwrap(), "touch api/.env");
        assert!(plan.commands()[2].starts_with("mkdir -p api/routes"));
    }

    #[test]
    fn rejects_bad_project_names() {
        for name in ["", "My App", "-leading", "trailing-", "a/b"] {
            assert!(
                matches!(
                    ProjectPlan::new(name, Framework::Vue, Database::None),
                    Err(PlanError::InvalidName(_))
                ),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn parses_selections() {
        assert_eq!("Next.js".parse::<Framework>().unwrap(), Framework::NextJs);
        assert_eq!("postgres".parse::<Database>().unwrap(), Database::PostgreSql);
        assert!("cobol".parse::<Framework>().is_err());
    }

    #[test]
    fn loads_toml_plan_and_defaults_titles() {
        let plan = ProjectPlan::from_toml(
            r#"
name = "notes"

[[steps]]
command = "mkdir notes"
title = "Create root"

[[steps]]
command = "touch notes/README.md"
"#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].title, "touch notes/README.md");
    }

    #[test]
    fn empty_toml_plan_is_rejected() {
        let err = ProjectPlan::from_toml("name = \"x\"\nsteps = []\n").unwrap_err();
        assert!(matches!(err, PlanError::Empty));
    }
}
