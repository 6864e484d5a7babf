/// Specifies the transport protocol to be used for the connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Direct TCP (port 445, 4-byte length-prefixed frames).
    #[default]
    Tcp,
}
