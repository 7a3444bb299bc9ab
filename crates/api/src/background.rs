//! Background tasks.
//!
//! The courier drain walks the queue oldest-first and hands each entry
//! to the SMTP mailer, marking it sent or failed. Delivery is
//! best-effort and fully decoupled from request handling.

use std::time::Duration;

use tokio::task::JoinHandle;
use veridian_courier::{MessageStatus, SmtpMailer};
use veridian_store::Persisters;

/// Poll interval between queue sweeps.
const DRAIN_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn the courier drain loop.
pub fn spawn_courier_drain(persisters: Persisters, mailer: SmtpMailer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
        loop {
            ticker.tick().await;

            loop {
                let message = match persisters.courier.next_queued_message().await {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::error!(error = %err, "Courier queue read failed");
                        break;
                    }
                };

                let status = match mailer.send(&message).await {
                    Ok(()) => MessageStatus::Sent,
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            recipient = %message.recipient,
                            "Courier delivery failed"
                        );
                        MessageStatus::Failed
                    }
                };

                if let Err(err) = persisters
                    .courier
                    .set_message_status(message.id, status)
                    .await
                {
                    tracing::error!(error = %err, "Courier status update failed");
                    break;
                }
            }
        }
    })
}
