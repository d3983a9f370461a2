use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    docent_cli::run()
}
