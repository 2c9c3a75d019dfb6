use crate::sql::base::error::ConnectorError;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{
    Client, Config, Connection, NoTls, config::SslMode, tls::TlsStream, Socket,
};
use tracing::{debug, error, warn};

const APPLICATION_NAME: &str = "tableflow";

/// Connects honouring the `sslmode` of the url. `prefer` falls back to a
/// plain connection when the TLS handshake fails.
pub(crate) async fn connect_client(url: &str) -> Result<Client, ConnectorError> {
    let mut config = url
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }

    debug!(
        dbname = config.get_dbname().unwrap_or_default(),
        user = config.get_user().unwrap_or_default(),
        ssl_mode = ?config.get_ssl_mode(),
        "Connecting to Postgres"
    );

    match config.get_ssl_mode() {
        SslMode::Disable => connect_without_tls(&config).await,
        SslMode::Prefer => match connect_with_tls(&config).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                connect_without_tls(&config).await
            }
        },
        _ => connect_with_tls(&config).await,
    }
}

async fn connect_with_tls(config: &Config) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let (client, connection) = config.connect(MakeTlsConnector::new(connector)).await?;
    drive(connection);
    Ok(client)
}

async fn connect_without_tls(config: &Config) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await?;
    drive(connection);
    Ok(client)
}

/// The connection object performs the actual I/O and must be polled on its
/// own task for the client to make progress.
fn drive<T>(connection: Connection<Socket, T>)
where
    T: TlsStream + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
}
