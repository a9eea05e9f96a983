//! Mail connector adapter - Implements the protocol ports using integration_mail

use application::{
    error::ApplicationError,
    ports::{
        ConnectionTest, FetchOptions, ImapFlags, IncomingMailClient, MailAddress,
        MailConnectorPort, MessageContent, OutgoingEmail, OutgoingMailClient, RawImapMessage,
        RawMessage, RawPop3Message, SendOutcome,
    },
};
use async_trait::async_trait;
use domain::{EmailAccount, MailProtocol, ServerEndpoint};
use integration_mail::{
    Address, Attachment, ImapClient, ImapFetch, ImapMessage, MailError, MailServerConfig,
    MailTimeouts, Mailbox, OutgoingMessage, ParsedMessage, Pop3Client, Pop3Message, SmtpClient,
    TlsConfig,
};
use secrecy::SecretString;
use tracing::{debug, instrument};

/// Builds network clients for an account's configured servers
#[derive(Debug, Clone, Default)]
pub struct NetworkMailConnector {
    tls: TlsConfig,
    timeouts: MailTimeouts,
}

impl NetworkMailConnector {
    pub fn new(tls: TlsConfig, timeouts: MailTimeouts) -> Self {
        Self { tls, timeouts }
    }

    fn server_config(
        &self,
        account: &EmailAccount,
        endpoint: &ServerEndpoint,
        password: SecretString,
    ) -> MailServerConfig {
        MailServerConfig::new(
            endpoint.host.clone(),
            endpoint.port,
            endpoint.secure,
            account.email_address.as_str(),
            password,
        )
        .with_tls(self.tls.clone())
        .with_timeouts(self.timeouts)
    }
}

impl MailConnectorPort for NetworkMailConnector {
    fn incoming(
        &self,
        account: &EmailAccount,
        password: SecretString,
    ) -> Result<Box<dyn IncomingMailClient>, ApplicationError> {
        let config = self.server_config(account, &account.incoming, password);
        debug!(account_id = %account.id, protocol = %account.protocol(), server = %account.incoming, "Building incoming client");
        Ok(match account.protocol() {
            MailProtocol::Imap => Box::new(ImapIncoming {
                client: ImapClient::new(config),
            }),
            MailProtocol::Pop3 => Box::new(Pop3Incoming {
                client: Pop3Client::new(config),
            }),
        })
    }

    fn outgoing(
        &self,
        account: &EmailAccount,
        password: SecretString,
    ) -> Result<Box<dyn OutgoingMailClient>, ApplicationError> {
        let config = self.server_config(account, &account.outgoing, password);
        debug!(account_id = %account.id, server = %account.outgoing, "Building SMTP client");
        Ok(Box::new(SmtpOutgoing {
            client: SmtpClient::new(config),
        }))
    }
}

/// Map a protocol failure to an application error
fn map_error(e: MailError) -> ApplicationError {
    ApplicationError::ExternalService(e.to_string())
}

fn connection_test(result: Result<(), MailError>) -> ConnectionTest {
    match result {
        Ok(()) => ConnectionTest::ok(),
        Err(e) => ConnectionTest::failed(e.to_string()),
    }
}

fn convert_address(address: Address) -> MailAddress {
    MailAddress {
        address: address.address,
        name: address.name,
    }
}

fn convert_addresses(addresses: Vec<Address>) -> Vec<MailAddress> {
    addresses.into_iter().map(convert_address).collect()
}

fn convert_content(parsed: ParsedMessage) -> MessageContent {
    MessageContent {
        message_id: parsed.message_id,
        subject: parsed.subject,
        from: convert_addresses(parsed.from),
        to: convert_addresses(parsed.to),
        cc: convert_addresses(parsed.cc),
        bcc: convert_addresses(parsed.bcc),
        date: parsed.date,
        text: parsed.text,
        html: parsed.html,
    }
}

fn convert_imap(message: ImapMessage) -> RawMessage {
    RawMessage::Imap(RawImapMessage {
        uid: message.uid,
        flags: ImapFlags {
            seen: message.flags.seen,
            flagged: message.flags.flagged,
            answered: message.flags.answered,
            draft: message.flags.draft,
        },
        internal_date: message.internal_date,
        content: convert_content(message.parsed),
    })
}

fn convert_pop3(message: Pop3Message) -> RawMessage {
    RawMessage::Pop3(RawPop3Message {
        number: message.number,
        unique_id: message.unique_id,
        size: message.size,
        content: convert_content(message.parsed),
    })
}

fn convert_outgoing(email: &OutgoingEmail) -> OutgoingMessage {
    OutgoingMessage {
        from: Mailbox {
            address: email.from.as_str().to_string(),
            name: email.from_name.clone(),
        },
        to: email.to.clone(),
        cc: email.cc.clone(),
        bcc: email.bcc.clone(),
        subject: email.subject.clone(),
        text: email.text.clone(),
        html: email.html.clone(),
        attachments: email
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
                data: a.data.clone(),
            })
            .collect(),
    }
}

/// IMAP retrieval through [`ImapClient`]
#[derive(Debug)]
struct ImapIncoming {
    client: ImapClient,
}

#[async_trait]
impl IncomingMailClient for ImapIncoming {
    fn protocol(&self) -> MailProtocol {
        MailProtocol::Imap
    }

    async fn test_connection(&self) -> ConnectionTest {
        connection_test(self.client.test_connection().await)
    }

    async fn connect(&self) -> Result<(), ApplicationError> {
        self.client.connect().await.map_err(map_error)
    }

    #[instrument(skip(self))]
    async fn fetch_emails(
        &self,
        options: &FetchOptions,
    ) -> Result<Vec<RawMessage>, ApplicationError> {
        let messages = self
            .client
            .fetch(ImapFetch {
                folder: options.folder.clone(),
                limit: options.limit,
                since: options.since,
            })
            .await
            .map_err(map_error)?;
        Ok(messages.into_iter().map(convert_imap).collect())
    }

    async fn list_folders(&self) -> Result<Vec<String>, ApplicationError> {
        self.client.list_folders().await.map_err(map_error)
    }

    async fn disconnect(&self) -> Result<(), ApplicationError> {
        self.client.disconnect().await.map_err(map_error)
    }
}

/// POP3 retrieval through [`Pop3Client`]
#[derive(Debug)]
struct Pop3Incoming {
    client: Pop3Client,
}

#[async_trait]
impl IncomingMailClient for Pop3Incoming {
    fn protocol(&self) -> MailProtocol {
        MailProtocol::Pop3
    }

    async fn test_connection(&self) -> ConnectionTest {
        connection_test(self.client.test_connection().await)
    }

    async fn connect(&self) -> Result<(), ApplicationError> {
        self.client.connect().await.map_err(map_error)
    }

    /// POP3 has no folders or server-side date search; only `limit` applies
    #[instrument(skip(self))]
    async fn fetch_emails(
        &self,
        options: &FetchOptions,
    ) -> Result<Vec<RawMessage>, ApplicationError> {
        let messages = self.client.fetch(options.limit).await.map_err(map_error)?;
        Ok(messages.into_iter().map(convert_pop3).collect())
    }

    async fn list_folders(&self) -> Result<Vec<String>, ApplicationError> {
        Ok(self.client.list_folders())
    }

    async fn disconnect(&self) -> Result<(), ApplicationError> {
        self.client.disconnect().await.map_err(map_error)
    }
}

/// SMTP submission through [`SmtpClient`]
#[derive(Debug)]
struct SmtpOutgoing {
    client: SmtpClient,
}

#[async_trait]
impl OutgoingMailClient for SmtpOutgoing {
    async fn test_connection(&self) -> ConnectionTest {
        connection_test(self.client.test_connection().await)
    }

    #[instrument(skip(self, email), fields(subject = %email.subject))]
    async fn send_email(&self, email: &OutgoingEmail) -> Result<SendOutcome, ApplicationError> {
        let message_id = self
            .client
            .send(&convert_outgoing(email))
            .await
            .map_err(map_error)?;
        Ok(SendOutcome { message_id })
    }

    async fn close(&self) -> Result<(), ApplicationError> {
        self.client.close();
        Ok(())
    }
}
