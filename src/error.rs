use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("no [store] section in the configuration")]
    NoStore,
    #[display("could not connect to the object store")]
    Store,
    #[display("backup freshness validation failed")]
    Validation,
    #[display("could not reset the saved download plan")]
    Reset,
    #[display("spot-check download failed")]
    Download,
}
