use dbadmin::config::{load_config, Config, DriverKind};
use dbadmin::core::db::StatementType;
use dbadmin::{AdminError, Client, Driver, Result};
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "\
Usage: dbadmin <config.toml> [--json] <command> [args]

Commands:
  databases          List databases on the server
  schema             Show public tables of every database
  create <name>      Create a database
  drop <name>        Drop a database
  query <sql>        Run a query against the configured database
  update <sql>       Run a statement against the configured database and commit
  run <sql>          Dispatch to query or update based on the statement";

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let json = match args.iter().position(|a| a == "--json") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };

    if args.len() < 2 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    match start(&args[0], &args[1], &args[2..], json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn start(config_path: &str, command: &str, args: &[String], json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    info!("Starting dbadmin against {}:{}", config.server.host, config.server.port);

    match config.server.driver {
        DriverKind::Sqlite => {
            let server = config.sqlite_server()?;
            run(connect(server, &config)?, command, args, json)
        }
        #[cfg(feature = "postgres")]
        DriverKind::Postgres => {
            let driver = config.postgres_driver();
            run(connect(driver, &config)?, command, args, json)
        }
        #[cfg(not(feature = "postgres"))]
        DriverKind::Postgres => Err(AdminError::Config(
            "postgres driver requested but dbadmin was built without the `postgres` feature".to_string(),
        )),
    }
}

fn connect<D: Driver>(driver: D, config: &Config) -> Result<Client<D>> {
    let mut client = Client::connect(driver, config.server.host.as_str(), config.server.port)?
        .with_options(config.client);
    if let Some(database) = &config.server.database {
        client.select_database(database)?;
    }
    Ok(client)
}

fn run<D: Driver>(client: Client<D>, command: &str, args: &[String], json: bool) -> Result<()> {
    match command {
        "databases" => {
            let databases = client.list_databases()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                for name in databases {
                    println!("{}", name);
                }
            }
        }
        "schema" => {
            let map = client.schema_map()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (database, tables) in map.iter() {
                    match tables {
                        Some(tables) => println!("{}: {}", database, tables.join(", ")),
                        None => println!("{}: -", database),
                    }
                }
            }
        }
        "create" => client.create_database(argument(args, command, "a database name")?)?,
        "drop" => client.delete_database(argument(args, command, "a database name")?)?,
        "query" => print_table(&client, argument(args, command, "a SQL statement")?, json)?,
        "update" => client.update(argument(args, command, "a SQL statement")?)?,
        "run" => {
            let sql = argument(args, command, "a SQL statement")?;
            if StatementType::from_sql(sql).returns_rows() {
                print_table(&client, sql, json)?;
            } else {
                client.update(sql)?;
            }
        }
        other => {
            return Err(AdminError::Config(format!("unknown command `{}`\n\n{}", other, USAGE)));
        }
    }
    Ok(())
}

fn argument<'a>(args: &'a [String], command: &str, name: &str) -> Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| AdminError::Config(format!("`{}` expects {}", command, name)))
}

fn print_table<D: Driver>(client: &Client<D>, sql: &str, json: bool) -> Result<()> {
    let table = client.query(sql)?;
    if json {
        println!("{}", table.to_json()?);
    } else {
        print!("{}", table);
    }
    Ok(())
}
