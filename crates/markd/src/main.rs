mod app;
mod command;
mod logging;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "markd", version, about = "Live Markdown preview and static HTML export")]
pub struct Markd {
    #[clap(flatten)]
    pub args: app::Args,

    #[clap(subcommand)]
    pub cmd: app::RunCmd,
}

#[tokio::main]
async fn main() {
    let markd = Markd::parse();

    if let Err(e) = markd.cmd.run(markd.args).await {
        eprintln!("error: {e:?}");
        std::process::exit(1);
    }
}
