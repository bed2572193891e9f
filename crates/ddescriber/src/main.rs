use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = ddescriber::cli::Cli::parse();
    ddescriber::init(cli.verbose);
    ddescriber::cli::run(cli)
}
