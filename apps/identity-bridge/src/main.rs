use actix_web::{web, App, HttpServer};
use identity_bridge::config::BridgeConfig;
use identity_bridge::infra::state::build_state;
use identity_bridge::logging::security;
use identity_bridge::middleware::{
    cors_middleware, RequestTrace, SecurityHeaders, StructuredLogger, TraceSpan,
};
use identity_bridge::routes;
use tracing::{error, info};

mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if config.jwt_secret.is_none() {
        security::signing_secret_missing();
    }

    let app_state = match build_state().with_config(&config) {
        Ok(builder) => match builder.build().await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "failed to build application state");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "failed to wire identity provider");
            std::process::exit(1);
        }
    };

    let (host, port) = config.bind_addr();
    info!(
        host = %host,
        port,
        project_id = %config.idp.project_id,
        "starting identity bridge"
    );

    let data = web::Data::new(app_state);
    let origins = config.cors_allowed_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(cors_middleware(&origins))
            .wrap(SecurityHeaders)
            .wrap(StructuredLogger)
            .wrap(TraceSpan)
            .wrap(RequestTrace)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
