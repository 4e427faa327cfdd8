use barrage::prelude::*;
use clap::Parser;
use demos::{init_logging, DemoArgs, HttpGun};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = DemoArgs::parse();

    let generator = Generator::new(
        args.config(ScheduleKind::Rps)?
            .name("rps-demo")
            .gun(HttpGun::new(&args.url)),
    )?;
    generator.run()?;

    tokio::select! {
        (data, failed) = generator.wait() => {
            println!(
                "{} ok, {} failed, run failed: {failed}",
                data.ok_len(),
                data.fail_len()
            );
        }
        _ = tokio::signal::ctrl_c() => {
            generator.stop().await;
        }
    }
    println!("{:#?}", generator.stats().snapshot());
    Ok(())
}
