// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Multipart upload reader

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use utoipa::openapi::{
    Components, RefOr,
    request_body::RequestBody,
    schema::{KnownFormat, ObjectBuilder, Schema, SchemaFormat, Type},
};

use super::{ReadRequest, request_body};
use crate::error::{BadRequest, Result};

/// Multipart media type, without its boundary parameter
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// One part of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Form name of the part
    pub name: String,
    /// File name supplied by the client
    pub file_name: Option<String>,
    /// Content type of the part
    pub content_type: Option<String>,
    /// Raw content
    pub data: Bytes,
}

/// Every part of a `multipart/form-data` body, in the order received
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartRequest {
    parts: Vec<Part>,
}

impl MultipartRequest {
    /// First part named `name`
    pub fn get(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.name == name)
    }

    /// All parts named `name`
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts.iter().filter(move |part| part.name == name)
    }

    /// All parts
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

impl ReadRequest for MultipartRequest {
    async fn read(req: Request) -> Result<Self> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(MULTIPART_FORM_DATA));
        if !is_multipart {
            let found = req
                .headers()
                .get(header::CONTENT_TYPE)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
            return Err(BadRequest::InvalidContentType {
                expected: MULTIPART_FORM_DATA,
                found,
            }
            .into());
        }

        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|rejection| BadRequest::MalformedBody(Box::new(rejection)))?;

        let mut parts = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| BadRequest::MalformedBody(Box::new(e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(ToString::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| BadRequest::MalformedBody(Box::new(e)))?;
            parts.push(Part {
                name,
                file_name,
                content_type,
                data,
            });
        }

        Ok(Self { parts })
    }

    fn request_body(_components: &mut Components) -> Option<RequestBody> {
        let binary = ObjectBuilder::new()
            .schema_type(Type::String)
            .format(Some(SchemaFormat::KnownFormat(KnownFormat::Binary)));
        let schema = ObjectBuilder::new()
            .schema_type(Type::Object)
            .additional_properties(Some(binary))
            .build();
        Some(request_body(MULTIPART_FORM_DATA, RefOr::T(Schema::Object(schema))))
    }
}
