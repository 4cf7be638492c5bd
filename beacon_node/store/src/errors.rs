use types::BeaconStateError;

#[derive(Debug)]
pub enum Error {
    SszDecodeError(ssz::DecodeError),
    BeaconStateError(BeaconStateError),
    DBError { message: String },
    /// A write batch was rejected part-way; the database has not been modified.
    AtomicBatchAborted { message: String },
}

impl From<ssz::DecodeError> for Error {
    fn from(e: ssz::DecodeError) -> Error {
        Error::SszDecodeError(e)
    }
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}
