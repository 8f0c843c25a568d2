mod error;
mod sink;
mod socket;
mod stream;

pub use self::error::SocketError;
pub use self::sink::BrokerSink;
pub use self::socket::BrokerSocket;
pub use self::stream::BrokerStream;
