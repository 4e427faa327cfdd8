use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Installs logging and starts the mock service once per test binary. Returns the mock
/// service address.
#[allow(unused)]
pub fn init() -> SocketAddr {
    static ADDR: OnceLock<SocketAddr> = OnceLock::new();

    *ADDR.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(
                "barrage=debug,barrage_loki=debug,mock_service=info",
            ))
            .with_test_writer()
            .try_init();

        if let Err(err) = PrometheusBuilder::new().install_recorder() {
            error!("Unable to install metrics recorder: {err}");
        }

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        // The service outlives the per-test runtimes, so it gets its own.
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                mock_service::serve(listener).await;
            });
        });

        addr
    })
}
