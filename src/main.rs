//! 认证服务主入口

use auth_service::{
    auth::{JwtService, PasswordHasher},
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::{PgRefreshTokenRepository, PgTenantRepository, PgUserRepository},
    routes, telemetry,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

/// 过期刷新令牌清理周期
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// 连接池指标采样周期
const POOL_METRICS_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("auth-service {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("AUTH_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Auth service starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::connect(&config.database)
        .await
        .context("Failed to connect to credential store")?;
    db::migrate(&db_pool)
        .await
        .context("Failed to run migrations")?;

    tracing::info!("Database initialized");

    // 4. 构建存储与服务
    let store_timeout = Duration::from_secs(config.database.statement_timeout_secs);
    let users = Arc::new(PgUserRepository::new(db_pool.clone(), store_timeout));
    let tenants = Arc::new(PgTenantRepository::new(db_pool.clone(), store_timeout));
    let refresh_tokens = Arc::new(PgRefreshTokenRepository::new(db_pool.clone(), store_timeout));

    let jwt_service = Arc::new(JwtService::from_config(&config, refresh_tokens)?);
    let hasher = Arc::new(PasswordHasher::new()?);

    let app_state = Arc::new(AppState::new(
        config.clone(),
        users,
        tenants,
        jwt_service.clone(),
        hasher,
    ));

    // 5. 后台任务：清理过期刷新令牌、采样连接池
    let purge_service = jwt_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_service.purge_expired().await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, "Expired refresh tokens purged"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired refresh tokens"),
            }
        }
    });

    let metrics_pool = db_pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POOL_METRICS_INTERVAL);
        loop {
            interval.tick().await;
            db::record_pool_metrics(&metrics_pool);
        }
    });

    // 6. 构建路由
    let app = routes::create_router(app_state);

    // 7. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 8. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    db_pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制退出，避免长连接阻塞关闭
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("auth-service {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: auth-service [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 AUTH_ 前缀的环境变量完成，例如");
    println!("  AUTH_DATABASE__URL, AUTH_SECURITY__PRIVATE_KEY_PATH");
    println!("  可用选项请参考 .env.example");
}
