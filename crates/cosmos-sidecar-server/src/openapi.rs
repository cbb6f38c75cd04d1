// crates/cosmos-sidecar-server/src/openapi.rs
// ============================================================================
// Module: OpenAPI Document
// Description: Static OpenAPI 3.0 description of the sidecar HTTP surface.
// Purpose: Serve `/v3/api-docs` for client generation and discovery.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The document is assembled once at startup from `serde_json::json!`
//! literals. It describes the query endpoint, its parameters and headers, the
//! envelope schemas, and the actuator endpoints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::actuator::APP_VERSION;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Title of the API document.
pub const API_TITLE: &str = "Cosmos DB Query Sidecar API";
/// Path of the query endpoint template.
pub const QUERY_PATH_TEMPLATE: &str = "/cosmos/v1/query/{container}";

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Builds the OpenAPI document for a server bound at `bind`.
#[allow(
    clippy::too_many_lines,
    reason = "OpenAPI assembly is kept in one place to mirror the HTTP surface."
)]
#[must_use]
pub fn openapi_document(bind: &str) -> Value {
    let mut schemas = Map::new();
    schemas.insert(
        "QueryRequest".to_string(),
        json!({
            "type": "object",
            "properties": {
                "sql": { "type": "string", "example": "SELECT * FROM c WHERE c.userId = @userId" },
                "params": {
                    "type": "object",
                    "additionalProperties": true,
                    "description": "Named parameters; a missing '@' prefix is added."
                }
            },
            "required": ["sql"]
        }),
    );
    schemas.insert(
        "QueryData".to_string(),
        json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "results": { "type": "array", "items": { "type": "object" } },
                "continuationToken": { "type": "string" }
            },
            "required": ["count", "results"]
        }),
    );
    schemas.insert(
        "ErrorInfo".to_string(),
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "enum": ["BadRequest", "NotFound", "Timeout", "Throttled", "UpstreamError"]
                },
                "message": { "type": "string" },
                "details": { "type": "object", "additionalProperties": true }
            },
            "required": ["code", "message"]
        }),
    );
    schemas.insert(
        "CosmosMetadata".to_string(),
        json!({
            "type": "object",
            "properties": {
                "ru": { "type": "number" },
                "statusCode": { "type": "integer" },
                "activityId": { "type": "string" },
                "subStatus": { "type": "integer" },
                "retryAfterMs": { "type": "integer" }
            },
            "required": ["ru", "statusCode", "activityId", "subStatus"]
        }),
    );
    schemas.insert(
        "QueryResponse".to_string(),
        json!({
            "type": "object",
            "properties": {
                "ok": { "type": "boolean" },
                "data": { "$ref": "#/components/schemas/QueryData" },
                "error": { "$ref": "#/components/schemas/ErrorInfo" },
                "cosmos": { "$ref": "#/components/schemas/CosmosMetadata" }
            },
            "required": ["ok"]
        }),
    );

    let envelope = |description: &str| {
        json!({
            "description": description,
            "headers": {
                "X-Cosmos-RU": { "schema": { "type": "number" } },
                "X-Cosmos-Activity-Id": { "schema": { "type": "string" } },
                "X-Cosmos-SubStatus": { "schema": { "type": "integer" } },
                "X-Cosmos-Retry-After-Ms": { "schema": { "type": "integer" } },
                "X-Server-Correlation-Id": { "schema": { "type": "string" } }
            },
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/QueryResponse" }
                }
            }
        })
    };

    let query_operation = json!({
        "summary": "Execute a single page of a Cosmos DB SQL query.",
        "operationId": "executeQuery",
        "tags": ["query"],
        "parameters": [
            {
                "name": "container",
                "in": "path",
                "required": true,
                "schema": { "type": "string" }
            },
            {
                "name": "pk",
                "in": "query",
                "required": false,
                "description": "Partition key value; omit for cross-partition queries.",
                "schema": { "type": "string" }
            },
            {
                "name": "maxItemCount",
                "in": "query",
                "required": false,
                "description": "Maximum items in the page; non-positive values use the service default.",
                "schema": { "type": "integer" }
            },
            {
                "name": "ct",
                "in": "query",
                "required": false,
                "description": "Continuation token from a previous page.",
                "schema": { "type": "string" }
            },
            {
                "name": "X-Request-Id",
                "in": "header",
                "required": false,
                "description": "Caller request identifier, echoed when valid.",
                "schema": { "type": "string", "maxLength": 128 }
            },
            {
                "name": "X-Timeout-Ms",
                "in": "header",
                "required": false,
                "description": "Upper bound on the upstream call in milliseconds.",
                "schema": { "type": "integer", "minimum": 1 }
            }
        ],
        "requestBody": {
            "required": true,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/QueryRequest" }
                }
            }
        },
        "responses": {
            "200": envelope("Query page returned."),
            "400": envelope("Invalid request."),
            "404": envelope("Database or container not found."),
            "408": envelope("Upstream request timed out."),
            "413": envelope("Request body too large."),
            "429": envelope("Request rate too large; retry after the advertised delay."),
            "500": envelope("Upstream or internal failure."),
            "503": envelope("Too many in-flight requests.")
        }
    });

    let simple_get = |summary: &str| {
        json!({
            "get": {
                "summary": summary,
                "tags": ["actuator"],
                "responses": {
                    "200": {
                        "description": "OK",
                        "content": { "application/json": { "schema": { "type": "object" } } }
                    }
                }
            }
        })
    };

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "version": APP_VERSION,
            "description": "HTTP sidecar exposing parameterized Cosmos DB SQL queries with RU and activity diagnostics.",
            "license": { "name": "MIT", "url": "https://opensource.org/licenses/MIT" }
        },
        "servers": [{ "url": format!("http://{bind}") }],
        "paths": {
            QUERY_PATH_TEMPLATE: { "post": query_operation },
            "/actuator/health": simple_get("Liveness status."),
            "/actuator/info": simple_get("Application and Cosmos DB target information."),
            "/actuator/metrics": simple_get("In-process query counters.")
        },
        "components": { "schemas": schemas }
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::API_TITLE;
    use super::openapi_document;

    #[test]
    fn document_describes_query_endpoint() {
        let document = openapi_document("127.0.0.1:8080");
        assert_eq!(document["openapi"], "3.0.3");
        assert_eq!(document["info"]["title"], API_TITLE);
        assert_eq!(document["info"]["license"]["name"], "MIT");
        assert_eq!(document["servers"][0]["url"], "http://127.0.0.1:8080");
        let operation = &document["paths"]["/cosmos/v1/query/{container}"]["post"];
        for status in ["200", "400", "404", "408", "429", "500"] {
            assert!(operation["responses"].get(status).is_some(), "{status}");
        }
        assert!(document["components"]["schemas"].get("QueryResponse").is_some());
    }
}
