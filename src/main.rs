use anyhow::Result;
use clap::{crate_version, App as Cli, Arg};
use screen_history::{app::App, app::Step, config::Config, logger};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = Cli::new("screen-history")
        .version(crate_version!())
        .about("Replays navigation steps against an in-memory browser tab")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("DIR")
                .help("Directory holding config.yml")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("namespace")
                .short("n")
                .long("namespace")
                .value_name("NAME")
                .help("Application namespace used for recovery records")
                .default_value("demo"),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Log every state transition"),
        )
        .arg(
            Arg::with_name("steps")
                .value_name("STEP")
                .help("push:<type>, replace:<type>, back, forward, go:<index>, collapse:<start>-<end>, reload or restart")
                .multiple(true),
        )
        .get_matches();

    let config = Config::load(matches.value_of("config"))?;
    let debug = config.debug || matches.is_present("debug");
    logger::init(debug, Box::new(|line| eprintln!("{}", line)))?;

    let steps = matches
        .values_of("steps")
        .map(|values| values.map(str::parse).collect::<Result<Vec<Step>>>())
        .transpose()?
        .unwrap_or_default();
    let namespace = matches.value_of("namespace").unwrap_or("demo");

    for line in App::start(config, namespace, &steps).await? {
        println!("{}", line);
    }
    Ok(())
}
