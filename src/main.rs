use clap::error::ErrorKind;
use schema_field_counts::error::EXIT_USAGE;

fn main() {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = match schema_field_counts::parse_cli(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                println!("{}", err.render());
                std::process::exit(EXIT_USAGE);
            }
        },
    };

    if let Err(err) = schema_field_counts::run(&cli) {
        let code = err.exit_code();
        eprintln!("Error: {:#}", anyhow::Error::new(err));
        std::process::exit(code);
    }
}
