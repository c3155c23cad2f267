// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Protobuf content adapter
//!
//! Messages are `prost` values. Their document schema comes from an explicit
//! [`ProtoDescriptor`], walked field by field with the protobuf JSON mapping of
//! scalar kinds.

use std::future::Future;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use prost::Message;
use utoipa::openapi::{
    Components, RefOr,
    request_body::RequestBody,
    response::Responses,
    schema::{Array, KnownFormat, ObjectBuilder, Schema, SchemaFormat, Type},
};

use super::{Handler, ReadRequest, WriteResponse, content_type_is, ok_response, request_body};
use crate::{
    context::Context,
    error::{BadRequest, Result},
};

/// Protobuf media type
pub const APPLICATION_PROTOBUF: &str = "application/x-protobuf";

/// Scalar or composite kind of a message field
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// Enum with its value names
    Enum(&'static [&'static str]),
    /// Nested message
    Message(fn() -> MessageDescriptor),
}

/// One field of a message
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// JSON name of the field
    pub name: &'static str,
    /// Field kind
    pub kind: FieldKind,
    /// `repeated` fields become arrays
    pub repeated: bool,
}

impl FieldDescriptor {
    /// Singular field
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: false,
        }
    }

    /// Repeated field
    pub const fn repeated(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: true,
        }
    }
}

/// Shape of a message
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    /// Fully qualified message name
    pub name: &'static str,
    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

/// Messages able to describe their fields
pub trait ProtoDescriptor {
    /// Descriptor of the message
    fn descriptor() -> MessageDescriptor;
}

/// Object schema for a message, recursing into message fields
///
/// A message that contains itself is cut off at the second occurrence and
/// documented as a bare object.
pub fn message_schema(descriptor: &MessageDescriptor) -> Schema {
    walk(descriptor, &mut Vec::new())
}

fn walk(descriptor: &MessageDescriptor, visiting: &mut Vec<&'static str>) -> Schema {
    let mut object = ObjectBuilder::new().schema_type(Type::Object);
    if visiting.contains(&descriptor.name) {
        return Schema::Object(object.build());
    }

    visiting.push(descriptor.name);
    for field in &descriptor.fields {
        let mut schema = field_schema(field.kind, visiting);
        if field.repeated {
            schema = Schema::Array(Array::new(RefOr::T(schema)));
        }
        object = object.property(field.name, RefOr::T(schema));
    }
    visiting.pop();

    Schema::Object(object.build())
}

fn field_schema(kind: FieldKind, visiting: &mut Vec<&'static str>) -> Schema {
    let scalar = |schema_type: Type, format: Option<SchemaFormat>| {
        Schema::Object(
            ObjectBuilder::new()
                .schema_type(schema_type)
                .format(format)
                .build(),
        )
    };
    let known = |format: KnownFormat| Some(SchemaFormat::KnownFormat(format));
    let custom = |format: &str| Some(SchemaFormat::Custom(format.to_string()));

    match kind {
        FieldKind::Double => scalar(Type::Number, known(KnownFormat::Double)),
        FieldKind::Float => scalar(Type::Number, known(KnownFormat::Float)),
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            scalar(Type::Integer, known(KnownFormat::Int32))
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            scalar(Type::Integer, known(KnownFormat::Int64))
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => scalar(Type::Integer, custom("uint32")),
        FieldKind::Uint64 | FieldKind::Fixed64 => scalar(Type::Integer, custom("uint64")),
        FieldKind::Bool => scalar(Type::Boolean, None),
        FieldKind::String => scalar(Type::String, None),
        FieldKind::Bytes => scalar(Type::String, known(KnownFormat::Byte)),
        FieldKind::Enum(values) => Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::String)
                .enum_values(Some(values.iter().copied()))
                .build(),
        ),
        FieldKind::Message(nested) => walk(&nested(), visiting),
    }
}

/// Protobuf decoded request body
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoRequest<T>(pub T);

impl<T> ReadRequest for ProtoRequest<T>
where
    T: Message + Default + ProtoDescriptor + 'static,
{
    async fn read(req: Request) -> Result<Self> {
        content_type_is(&req, APPLICATION_PROTOBUF)?;
        let bytes = Bytes::from_request(req, &())
            .await
            .map_err(|rejection| BadRequest::MalformedBody(Box::new(rejection)))?;
        let message =
            T::decode(bytes).map_err(|e| BadRequest::MalformedBody(Box::new(e)))?;
        Ok(Self(message))
    }

    fn request_body(_components: &mut Components) -> Option<RequestBody> {
        let schema = message_schema(&T::descriptor());
        Some(request_body(APPLICATION_PROTOBUF, RefOr::T(schema)))
    }
}

/// Protobuf encoded 200 response
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoResponse<T>(pub T);

impl<T> WriteResponse for ProtoResponse<T>
where
    T: Message + ProtoDescriptor + 'static,
{
    fn write(self) -> Result<Response> {
        Ok((
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_PROTOBUF),
            )],
            self.0.encode_to_vec(),
        )
            .into_response())
    }

    fn responses(_components: &mut Components) -> Responses {
        ok_response(
            APPLICATION_PROTOBUF,
            RefOr::T(message_schema(&T::descriptor())),
        )
    }
}

/// See [`consume_proto`]
#[derive(Debug, Clone)]
pub struct ConsumeProto<H>(H);

impl<H, Req, Resp> Handler<ProtoRequest<Req>, Resp> for ConsumeProto<H>
where
    H: Handler<Req, Resp>,
{
    fn handle(
        &self,
        ctx: Context,
        req: ProtoRequest<Req>,
    ) -> impl Future<Output = Result<Resp>> + Send {
        self.0.handle(ctx, req.0)
    }
}

/// See [`return_proto`]
#[derive(Debug, Clone)]
pub struct ReturnProto<H>(H);

impl<H, Req, Resp> Handler<Req, ProtoResponse<Resp>> for ReturnProto<H>
where
    H: Handler<Req, Resp>,
{
    fn handle(
        &self,
        ctx: Context,
        req: Req,
    ) -> impl Future<Output = Result<ProtoResponse<Resp>>> + Send {
        let fut = self.0.handle(ctx, req);
        async move { fut.await.map(ProtoResponse) }
    }
}

/// Decode the request body as protobuf before calling `handler`
pub fn consume_proto<H, Req, Resp>(handler: H) -> ConsumeProto<H>
where
    H: Handler<Req, Resp>,
{
    ConsumeProto(handler)
}

/// Encode the handler's response as protobuf
pub fn return_proto<H, Req, Resp>(handler: H) -> ReturnProto<H>
where
    H: Handler<Req, Resp>,
{
    ReturnProto(handler)
}

/// Protobuf in, protobuf out
pub fn handle_proto<H, Req, Resp>(handler: H) -> ConsumeProto<ReturnProto<H>>
where
    H: Handler<Req, Resp>,
{
    ConsumeProto(ReturnProto(handler))
}
