use byte_unit::{Byte, Unit};
use clap::{command, value_parser, Arg, ArgAction};
use log::{debug, info};
use std::net::{IpAddr, SocketAddr};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Builder;

extern crate binkv;

fn main() {
    let cpus = num_cpus::get_physical().to_string();

    let matches = command!()
        .name("binkvd")
        .version(binkv::version::BINKV_VERSION)
        .about("binkvd - binary protocol key-value cache server")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .default_value("11211")
                .value_parser(value_parser!(u16))
                .help("TCP port to listen on"),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .default_value("127.0.0.1")
                .value_parser(value_parser!(IpAddr))
                .help("interface to listen on"),
        )
        .arg(
            Arg::new("conn-limit")
                .short('c')
                .long("conn-limit")
                .default_value("1024")
                .value_parser(value_parser!(u32))
                .help("max simultaneous connections"),
        )
        .arg(
            Arg::new("listen-backlog")
                .short('b')
                .long("listen-backlog")
                .default_value("1024")
                .value_parser(value_parser!(u32))
                .help("set the backlog queue limit"),
        )
        .arg(
            Arg::new("rx-timeout")
                .long("rx-timeout")
                .default_value("60")
                .value_parser(value_parser!(u32))
                .help("receive timeout in seconds, idle connections are dropped"),
        )
        .arg(
            Arg::new("max-item-size")
                .short('I')
                .long("max-item-size")
                .default_value("1MiB")
                .help("adjusts max item size (min: 1KiB, max: 1024MiB)"),
        )
        .arg(
            Arg::new("runtimes")
                .short('r')
                .long("runtimes")
                .default_value(cpus)
                .value_parser(value_parser!(u32))
                .help("number of single threaded runtimes accepting connections"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets the level of verbosity"),
        )
        .get_matches();

    let port = *matches.get_one::<u16>("port").unwrap();
    let listen_address = *matches.get_one::<IpAddr>("listen").unwrap();
    let connection_limit = *matches.get_one::<u32>("conn-limit").unwrap();
    let backlog_limit = *matches.get_one::<u32>("listen-backlog").unwrap();
    let rx_timeout_secs = *matches.get_one::<u32>("rx-timeout").unwrap();
    let runtimes = *matches.get_one::<u32>("runtimes").unwrap();

    let item_size_limit_str = matches.get_one::<String>("max-item-size").unwrap();
    let item_size_limit = Byte::parse_str(item_size_limit_str, true).unwrap_or_else(|err| {
        eprintln!("Invalid max item size {:?}: {}", item_size_limit_str, err);
        process::exit(1);
    });
    let item_size_limit_max = Byte::from_u64_with_unit(1024, Unit::MiB).unwrap();
    if item_size_limit > item_size_limit_max {
        eprintln!(
            "Max item size cannot be greater than: {:#}",
            item_size_limit_max
        );
        process::exit(1);
    }

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'binkvd -v -v -v' or 'binkvd -vvv' vs 'binkvd -v'
    let log_level = match matches.get_count("verbose") {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_log::LogTracer::init().unwrap();
    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("Listen address: {}", listen_address);
    info!("Listen port: {}", port);
    info!("Connection limit: {}", connection_limit);
    info!("Number of runtimes: {}", runtimes);
    info!("Max item size: {}", item_size_limit.as_u64());

    let config = binkv::server::memc_tcp::MemcacheServerConfig::new(
        rx_timeout_secs,
        connection_limit,
        item_size_limit.as_u64() as u32,
        backlog_limit,
    );

    let system_timer = Arc::new(binkv::server::timer::SystemTimer::new());
    let store = Arc::new(binkv::memory_store::sharded_store::ShardedMemoryStore::new(
        system_timer.clone(),
    ));

    let addr = SocketAddr::new(listen_address, port);
    for i in 0..runtimes {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            debug!("Creating runtime {}", i);
            let child_runtime = create_runtime();
            let mut tcp_server = binkv::server::memc_tcp::MemcacheTcpServer::new(config, store);
            child_runtime.block_on(tcp_server.run(addr)).unwrap()
        });
    }
    let parent_runtime = create_runtime();
    parent_runtime.block_on(system_timer.run())
}

fn create_runtime() -> tokio::runtime::Runtime {
    Builder::new_current_thread()
        .thread_name_fn(|| {
            static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
            let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
            format!("binkvd-wrk-{}", id)
        })
        .enable_all()
        .build()
        .unwrap()
}
