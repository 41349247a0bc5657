// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Include all vector test modules
mod vector {
    mod test_hnsw_index;
}
