use descrint_cli::descrint_cli;
use descrint_error::DescrIntError;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = descrint_cli(args) {
        eprintln!("Error ({:?}): {err}", err.code());
        std::process::exit(1);
    }
}
