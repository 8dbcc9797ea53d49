//! Arrow export of a sample list.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, Float64Builder, LargeListBuilder, RecordBatch, RecordBatchOptions, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema};

use crate::samples::SampleList;

fn list_builder(capacity: usize) -> LargeListBuilder<Float64Builder> {
    LargeListBuilder::with_capacity(Float64Builder::with_capacity(capacity), capacity)
        .with_field(Field::new("item", DataType::Float64, false))
}

impl SampleList {
    /// One row per sample: slot, parent, log-likelihood, log-weight and the
    /// model and hyperparameters as lists.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let n = self.len();
        let mut id = UInt64Builder::with_capacity(n);
        let mut parent = UInt64Builder::with_capacity(n);
        let mut log_l = Float64Builder::with_capacity(n);
        let mut log_w = Float64Builder::with_capacity(n);
        let mut parameters = list_builder(n);
        let mut hypars = list_builder(n);

        for sample in self.iter() {
            id.append_value(sample.id as u64);
            parent.append_option(sample.parent.map(|p| p as u64));
            log_l.append_value(sample.log_l);
            log_w.append_value(sample.log_w);
            parameters.values().append_slice(&sample.parameters);
            parameters.append(true);
            hypars.values().append_slice(&sample.hypars);
            hypars.append(true);
        }

        let columns: Vec<(Field, ArrayRef)> = vec![
            (
                Field::new("id", DataType::UInt64, false),
                Arc::new(id.finish()),
            ),
            (
                Field::new("parent", DataType::UInt64, true),
                Arc::new(parent.finish()),
            ),
            (
                Field::new("log_l", DataType::Float64, false),
                Arc::new(log_l.finish()),
            ),
            (
                Field::new("log_w", DataType::Float64, false),
                Arc::new(log_w.finish()),
            ),
            (
                Field::new(
                    "parameters",
                    DataType::LargeList(Arc::new(Field::new("item", DataType::Float64, false))),
                    false,
                ),
                Arc::new(parameters.finish()),
            ),
            (
                Field::new(
                    "hypars",
                    DataType::LargeList(Arc::new(Field::new("item", DataType::Float64, false))),
                    false,
                ),
                Arc::new(hypars.finish()),
            ),
        ];
        let (fields, arrays): (Vec<_>, Vec<_>) = columns.into_iter().unzip();

        RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(n)),
        )
        .context("Could not create record batch of samples")
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, UInt64Type};

    use crate::{
        components::Polynomial,
        model::Model,
        samples::{Sample, SampleList},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn export_columns() {
        let mut list = SampleList::new();
        for (i, npars) in [1usize, 2, 2].into_iter().enumerate() {
            list.add(Sample {
                id: i,
                parent: (i > 0).then(|| i - 1),
                model: Model::new(Polynomial::new(npars - 1)),
                parameters: vec![0.5; npars],
                hypars: vec![],
                log_l: -(i as f64),
                log_w: -1.,
            });
        }
        let batch = list.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 6);

        let parent = batch.column_by_name("parent").unwrap();
        assert!(parent.is_null(0));
        assert_eq!(parent.as_primitive::<UInt64Type>().value(2), 1);

        let log_l = batch.column_by_name("log_l").unwrap();
        assert_eq!(log_l.as_primitive::<Float64Type>().value(1), -1.);

        let parameters = batch.column_by_name("parameters").unwrap().as_list::<i64>();
        assert_eq!(parameters.value_length(0), 1);
        assert_eq!(parameters.value_length(1), 2);
        let hypars = batch.column_by_name("hypars").unwrap().as_list::<i64>();
        assert_eq!(hypars.value_length(2), 0);
    }
}
