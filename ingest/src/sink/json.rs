use chrono::{DateTime, Utc};
use log::info;
use nexradcore::output::{FinishedSweep, OutputField};
use nexradcore::prelude::{SinkError, SweepSink};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkOptions {
    /// Write the raw gate arrays, not just per-field statistics.
    pub include_data: bool,
    pub pretty: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            include_data: false,
            pretty: true,
        }
    }
}

/// Writes one JSON document per finished sweep into a directory.
pub struct JsonSweepSink {
    output_dir: PathBuf,
    options: SinkOptions,
    written: Vec<PathBuf>,
}

impl JsonSweepSink {
    pub fn create<P: AsRef<Path>>(output_dir: P, options: SinkOptions) -> Result<Self, SinkError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            options,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// `<site>_<YYYYMMDD>_<HHMMSS>_el<angle>.json`
    pub fn file_name(sweep: &FinishedSweep) -> String {
        let attrs = &sweep.attributes;
        let site = attrs.site.as_deref().unwrap_or("XXXX");
        let start = DateTime::<Utc>::from_timestamp(attrs.start_time.floor() as i64, 0)
            .unwrap_or_default();
        format!(
            "{}_{}_el{:.1}.json",
            site,
            start.format("%Y%m%d_%H%M%S"),
            attrs.fixed_angle
        )
    }

    fn document(&self, sweep: &FinishedSweep) -> Value {
        let mut fields: Vec<Value> = sweep
            .fields
            .iter()
            .map(|field| self.field_entry(field))
            .collect();
        if let Some(phi) = &sweep.phi {
            fields.push(self.field_entry(phi));
        }
        let mut document = json!({
            "attributes": sweep.attributes,
            "dimensions": {
                "rays": sweep.num_rays(),
                "gates": sweep.fields.iter().map(|f| f.num_gates()).max().unwrap_or(0),
            },
            "azimuth": sweep.azimuth,
            "elevation": sweep.elevation,
            "time": sweep.time,
            "fields": fields,
        });
        if let Some(zones) = &sweep.clutter_map {
            document["clutter_map"] = json!({
                "segment": sweep.attributes.clutter_segment,
                "zones": zones,
            });
        }
        if let Some(bypass) = &sweep.bypass_map {
            let bypassed: u32 = bypass.words.iter().map(|word| word.count_ones()).sum();
            let mut entry = json!({
                "segment_num": bypass.segment_num,
                "bypassed_bins": bypassed,
            });
            if self.options.include_data {
                entry["words"] = json!(bypass.words);
            }
            document["bypass_map"] = entry;
        }
        document
    }

    fn field_entry<T>(&self, field: &OutputField<T>) -> Value
    where
        T: Copy + PartialEq + Into<f64> + Serialize,
    {
        let mut entry = json!({
            "name": field.name,
            "units": field.units,
            "scale": field.scaling.scale,
            "bias": field.scaling.bias,
            "range_to_first_gate_m": field.first_gate_m,
            "gate_spacing_m": field.gate_spacing_m,
            "missing": field.missing,
            "gates": field.num_gates(),
            "summary": field.summary(),
        });
        if self.options.include_data {
            let rows: Vec<Vec<T>> = field.data.outer_iter().map(|row| row.to_vec()).collect();
            entry["data"] = json!(rows);
        }
        entry
    }
}

impl SweepSink for JsonSweepSink {
    fn write(&mut self, sweep: &FinishedSweep) -> Result<(), SinkError> {
        let path = self.output_dir.join(Self::file_name(sweep));
        let document = self.document(sweep);
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        }
        .map_err(|err| SinkError::Write(err.to_string()))?;
        fs::write(&path, text)?;
        info!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}
