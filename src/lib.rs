/*!
# Form Relay

Progress tracking and submission recording for a small committee website's polls
and contact forms.

## Overview

The site is static: every poll is a plain HTML form split into titled sections.
This crate supplies the two pieces of logic behind those forms:

- **Form Completion Tracker** - scores how much of a multi-section form is answered
  and drives a ring indicator, a percentage label and a per-section detail panel.
- **Submission Relay** - validates a posted form, appends it as one row to the
  poll's response sheet, optionally emails the committee a digest, and answers with
  a JSON result envelope.

## Architecture

### Tracker
- `form` holds the snapshot model: sections, single-value questions and choice groups
- `progress` is a pure function from a snapshot to a `ProgressSnapshot`, plus the
  color ramp and ring geometry
- `tracker` applies a snapshot to whatever surface exists; missing elements are skipped

### Relay
- `schema` defines each poll's fixed column order and page layout
- `submission` turns form-encoded pairs into an ordered field map
- `relay` validates the institutional email and the poll deadline, then appends
- `sheet` and `saving` keep one append-only, gzip+bincode sheet per poll
- `mailer` renders the admin digest and sends it over SMTP
- `downloader` exports a sheet as CSV or XLSX
- `config` loads a JSON config with environment overrides

### Server (feature `web`)
- `app` exposes the relay and the tracker over HTTP with axum

## REST API Endpoints

- `GET /polls` - Lists polls and whether they are open
- `GET /polls/{poll}` - Liveness probe, plain text
- `POST /polls/{poll}` - Records a form-encoded submission, returns `{result, error?, row?}`
- `POST /polls/{poll}/progress` - Scores form-encoded values, returns snapshot and panel state
- `GET /polls/{poll}/export.csv`, `GET /polls/{poll}/export.xlsx` - Downloads the response sheet
*/

pub mod downloader;
pub mod form;
pub mod mailer;
pub mod progress;
pub mod saving;
pub mod schema;
pub mod sheet;
pub mod submission;
pub mod tracker;

#[cfg(feature = "web")]
pub mod app;
pub mod config;
#[cfg(feature = "web")]
pub mod relay;

pub use form::{Control, FormSection, FormSnapshot, GroupScope, Question};
pub use progress::{ProgressSnapshot, SectionStatus, evaluate};
pub use schema::PollSchema;
pub use sheet::{FileStore, MemoryStore, RowStore, Sheet};
pub use submission::Submission;
