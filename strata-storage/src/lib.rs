// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Storage backends for strata.
//!
//! A storage holds the entries of one cache tier. It does not bound its size and does not choose
//! victims, both are done by the tier that owns it.

mod file;
mod memory;
mod storage;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use storage::Storage;
