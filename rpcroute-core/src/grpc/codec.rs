//! # Dynamic Message Codec
//!
//! This module implements `tonic::codec::Codec` for `prost_reflect::DynamicMessage`, so
//! `tonic` can carry messages whose types are only known from a descriptor at runtime.
//!
//! ## How it works
//!
//! 1. **Encoder**:
//!    - Takes a `DynamicMessage` already built by a serializer or by the caller.
//!    - Checks it is an instance of the call's input message type.
//!    - Serializes it into the gRPC byte buffer.
//!
//! 2. **Decoder**:
//!    - Creates an empty `DynamicMessage` of the call's output message type.
//!    - Merges the frame bytes into it.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A `tonic` codec for one RPC method, typed by the method's input and output schemas.
pub struct DynamicCodec {
    input: MessageDescriptor,
    output: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(input: MessageDescriptor, output: MessageDescriptor) -> Self {
        Self { input, output }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder(self.input.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.output.clone())
    }
}

/// Responsible for encoding a request message into Protobuf bytes.
pub struct DynamicEncoder(MessageDescriptor);

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        // Descriptors from separately decoded pools never compare equal, so match on names.
        if item.descriptor().full_name() != self.0.full_name() {
            return Err(Status::invalid_argument(format!(
                "Expected a '{}' message but got '{}'",
                self.0.full_name(),
                item.descriptor().full_name()
            )));
        }

        item.encode(dst)
            .map_err(|e| Status::internal(format!("Failed to encode Protobuf message: {}", e)))
    }
}

/// Responsible for decoding Protobuf bytes into a response message.
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode Protobuf bytes: {}", e)))?;

        Ok(Some(msg))
    }
}
