// @generated
// Generated from: proto/lighthouse/v1/lighthouse.proto
// Manual check-in for offline builds.
//
// Canonical on-disk encoding of project and pledge files. prost writes fields
// in tag order and this schema has no maps, so equal messages always encode to
// equal bytes; content identifiers depend on that.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Output {
    #[prost(uint64, tag = "1")]
    pub amount: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub script: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Project {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(string, tag = "2")]
    pub network: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub outputs: ::prost::alloc::vec::Vec<Output>,
    #[prost(int64, tag = "4")]
    pub created_at: i64,
    #[prost(int64, optional, tag = "5")]
    pub expires_at: ::core::option::Option<i64>,
    #[prost(string, tag = "6")]
    pub memo: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub title: ::prost::alloc::string::String,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub cover_image: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub auth_key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(uint64, optional, tag = "10")]
    pub min_pledge_amount: ::core::option::Option<u64>,
    #[prost(string, repeated, tag = "11")]
    pub tags: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Input {
    #[prost(bytes = "vec", tag = "1")]
    pub tx_hash: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub output_index: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub unlock_script: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub sequence: u32,
    #[prost(uint64, tag = "5")]
    pub value: u64,
    #[prost(bytes = "vec", tag = "6")]
    pub prev_script: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContactInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub email: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pledge {
    #[prost(bytes = "vec", tag = "1")]
    pub project_id: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub inputs: ::prost::alloc::vec::Vec<Input>,
    #[prost(message, optional, tag = "3")]
    pub contact: ::core::option::Option<ContactInfo>,
    #[prost(string, optional, tag = "4")]
    pub memo: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, tag = "5")]
    pub created_at: i64,
    #[prost(string, optional, tag = "6")]
    pub refund_address: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(uint64, tag = "7")]
    pub amount: u64,
    #[prost(message, repeated, tag = "8")]
    pub outputs: ::prost::alloc::vec::Vec<Output>,
}
