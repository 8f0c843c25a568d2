pub mod defaults;

//
// Types
//
pub type BrokerId = i32;

// Topic
pub type TopicName = String;
pub type PartitionId = i32;
pub type PartitionCount = i32;

// Log
pub type Offset = i64;
pub type Timestamp = i64;
