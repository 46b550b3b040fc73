//! Outbound candidate email. `ConsoleMailer` is the development fallback:
//! it writes the message to the log instead of sending. SMTP delivery is
//! behind the `email` feature.

use crate::error::EngineResult;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> EngineResult<()>;
}

/// Logs outbound mail; used whenever SMTP credentials are absent.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: &Mail) -> EngineResult<()> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "console mail");
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpMailer;

#[cfg(feature = "email")]
mod smtp {
    use super::{Mail, Mailer};
    use crate::config::SmtpConfig;
    use crate::error::{EngineError, EngineResult};
    use async_trait::async_trait;
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    pub struct SmtpMailer {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
    }

    impl SmtpMailer {
        pub fn new(config: &SmtpConfig) -> EngineResult<Self> {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| EngineError::Infrastructure(format!("smtp relay: {e}")))?
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build();
            Ok(Self {
                transport,
                from_address: config.from_address.clone(),
            })
        }
    }

    #[async_trait]
    impl Mailer for SmtpMailer {
        async fn send(&self, mail: &Mail) -> EngineResult<()> {
            let message = Message::builder()
                .from(
                    self.from_address
                        .parse()
                        .map_err(|e| EngineError::Infrastructure(format!("smtp from: {e}")))?,
                )
                .to(mail
                    .to
                    .parse()
                    .map_err(|e| EngineError::Infrastructure(format!("smtp to: {e}")))?)
                .subject(&mail.subject)
                .header(ContentType::TEXT_PLAIN)
                .body(mail.body.clone())
                .map_err(|e| EngineError::Infrastructure(format!("smtp build: {e}")))?;
            self.transport
                .send(message)
                .await
                .map_err(|e| EngineError::Infrastructure(format!("smtp send: {e}")))?;
            Ok(())
        }
    }
}
