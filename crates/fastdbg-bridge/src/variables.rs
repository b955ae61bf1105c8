//! The variable table: snapshot decoding and staged edits.

use fastdbg_codec::{decode_value, read_bytes, read_word, CodecError, Value, VarType};
use fastdbg_symbols::{VarValue, Variable};

use crate::error::BridgeError;
use crate::protocol::{
    reports_pointer_table, DumpRequest, VariableWrite, POINTER_CHUNK, SNAPSHOT_OFFSET,
};

/// Program variables in display order, plus the layout the target
/// reports them in.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: Vec<Variable>,
    /// Address from the label file of each variable; 0 when unlinked.
    /// Heap-resident variables later have their `address` replaced by
    /// the real data address, so the slot is kept apart.
    slots: Vec<u16>,
    min_address: u16,
    scalar_len: u16,
}

impl VariableTable {
    /// Build the table from resolved variables, sorting them by name.
    pub fn new(mut variables: Vec<Variable>) -> Self {
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        let slots: Vec<u16> = variables.iter().map(|v| v.address).collect();

        let min_address = slots.iter().copied().filter(|&a| a != 0).min().unwrap_or(0);
        // The block runs from the lowest slot to the end of the highest
        // directly reported scalar.
        let scalar_end = variables
            .iter()
            .zip(&slots)
            .filter(|(v, &slot)| slot != 0 && !v.is_heap_resident())
            .map(|(v, &slot)| usize::from(slot) + v.var_type.width())
            .max()
            .unwrap_or(usize::from(min_address));
        let scalar_len = (scalar_end - usize::from(min_address)) as u16;

        Self {
            variables,
            slots,
            min_address,
            scalar_len,
        }
    }

    /// All variables, sorted by name.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// What the target must report on every stop.
    pub fn dump_request(&self) -> DumpRequest {
        let regions = self
            .linked()
            .filter(|(v, _)| v.is_heap_resident())
            .map(|(v, slot)| (slot, v.dump_len() as u16))
            .collect();
        DumpRequest {
            min_address: self.min_address,
            scalar_len: self.scalar_len,
            regions,
        }
    }

    /// Refresh every variable from a stop report.
    ///
    /// Strings and arrays also learn their real data addresses here.
    /// Nothing changes unless the whole report could be read.
    pub fn apply_snapshot(&mut self, packet: &[u8]) -> Result<(), CodecError> {
        let readings = self.read_snapshot(packet)?;
        for (variable, reading) in self.variables.iter_mut().zip(readings) {
            match reading {
                Reading::Unlinked => {}
                Reading::Large { address } => variable.address = address,
                Reading::Scalar { address, value } => {
                    if let Some(address) = address {
                        variable.address = address;
                    }
                    variable.refresh(value);
                }
                Reading::Elements { address, elements } => {
                    variable.address = address;
                    if let VarValue::Elements(children) = &mut variable.value {
                        for (child, (address, value)) in children.iter_mut().zip(elements) {
                            if let Some(address) = address {
                                child.address = address;
                            }
                            child.refresh(value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode a stop report in table order without touching the table.
    fn read_snapshot(&self, packet: &[u8]) -> Result<Vec<Reading>, CodecError> {
        let mut heap = SNAPSHOT_OFFSET + usize::from(self.scalar_len);
        let mut readings = Vec::with_capacity(self.variables.len());

        for (variable, &slot) in self.variables.iter().zip(&self.slots) {
            let ty = variable.var_type;
            let reading = match &variable.value {
                _ if slot == 0 => Reading::Unlinked,
                VarValue::LargeArray { .. } => {
                    read_bytes(packet, heap, 2 + variable.dump_len())?;
                    let address = read_word(packet, heap)?;
                    heap += 2 + variable.dump_len();
                    Reading::Large { address }
                }
                VarValue::Scalar(_) if ty == VarType::String => {
                    let address = read_word(packet, heap)?;
                    let buffer = read_bytes(packet, heap + 2, ty.width())?;
                    let value = decode_value(ty, buffer, 0)?;
                    heap += 2 + ty.width();
                    Reading::Scalar {
                        address: Some(address),
                        value,
                    }
                }
                VarValue::Scalar(_) => {
                    let offset = SNAPSHOT_OFFSET + usize::from(slot - self.min_address);
                    Reading::Scalar {
                        address: None,
                        value: decode_value(ty, packet, offset)?,
                    }
                }
                VarValue::Elements(children) => {
                    let base = read_word(packet, heap)?;
                    heap += 2;
                    let elements = read_elements(packet, &mut heap, variable, base, children.len())?;
                    Reading::Elements {
                        address: base,
                        elements,
                    }
                }
            };
            readings.push(reading);
        }
        Ok(readings)
    }

    /// Look a variable up by display name, ignoring case. `$` and `%`
    /// suffixes may be left off.
    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.position(name).map(|i| &self.variables[i])
    }

    /// Stage a new value for a scalar variable.
    pub fn set_variable(&mut self, name: &str, text: &str) -> Result<Value, BridgeError> {
        let variable = self.find_mut(name)?;
        if variable.is_array() {
            return Err(BridgeError::ReadOnly {
                name: variable.name.clone(),
            });
        }
        let value = parse(variable, text)?;
        variable.stage(value.clone());
        Ok(value)
    }

    /// Stage a new value for one element of an enumerated array.
    pub fn set_element(
        &mut self,
        name: &str,
        index: usize,
        text: &str,
    ) -> Result<Value, BridgeError> {
        let variable = self.find_mut(name)?;
        let array_name = variable.name.clone();
        if matches!(variable.value, VarValue::LargeArray { .. }) {
            return Err(BridgeError::ReadOnly { name: array_name });
        }
        let element = variable
            .element_mut(index)
            .ok_or_else(|| BridgeError::UnknownVariable {
                name: format!("{array_name}({index})"),
            })?;
        let value = parse(element, text)?;
        element.stage(value.clone());
        variable.modified = true;
        Ok(value)
    }

    /// Writes for every staged edit, in table order.
    pub fn pending_writes(&self) -> Vec<VariableWrite> {
        let mut writes = Vec::new();
        for variable in self.variables.iter().filter(|v| v.modified) {
            match &variable.value {
                VarValue::Scalar(value) if variable.address != 0 => {
                    writes.push(VariableWrite::new(variable.address, value));
                }
                VarValue::Elements(elements) => {
                    writes.extend(
                        elements
                            .iter()
                            .filter(|e| e.modified && e.address != 0)
                            .filter_map(|e| {
                                e.scalar_value().map(|v| VariableWrite::new(e.address, v))
                            }),
                    );
                }
                _ => {
                    tracing::warn!(name = %variable.name, "edit of unlinked variable dropped");
                }
            }
        }
        writes
    }

    /// Forget staged edits once they reached the target.
    pub fn clear_modified(&mut self) {
        for variable in &mut self.variables {
            variable.modified = false;
            if let VarValue::Elements(elements) = &mut variable.value {
                for element in elements {
                    element.modified = false;
                }
            }
        }
    }

    fn linked(&self) -> impl Iterator<Item = (&Variable, u16)> {
        self.variables
            .iter()
            .zip(self.slots.iter().copied())
            .filter(|(_, slot)| *slot != 0)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.variables
                    .iter()
                    .position(|v| v.label_name().eq_ignore_ascii_case(name))
            })
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Variable, BridgeError> {
        match self.position(name) {
            Some(i) => Ok(&mut self.variables[i]),
            None => Err(BridgeError::UnknownVariable {
                name: name.to_string(),
            }),
        }
    }
}

/// One variable's share of a stop report.
enum Reading {
    Unlinked,
    Large {
        address: u16,
    },
    Scalar {
        address: Option<u16>,
        value: Value,
    },
    Elements {
        address: u16,
        elements: Vec<(Option<u16>, Value)>,
    },
}

/// Decode the data of an enumerated array whose base word was just read.
///
/// Regions the target reports as a pointer table arrive as 256-byte
/// chunks, each behind the word stored at the next table entry. That
/// happens for every element type, so the chunks are joined before the
/// elements are decoded. Only string arrays really are pointer tables;
/// their chunk words are the element addresses.
fn read_elements(
    packet: &[u8],
    heap: &mut usize,
    array: &Variable,
    base: u16,
    count: usize,
) -> Result<Vec<(Option<u16>, Value)>, CodecError> {
    let ty = array.var_type;
    let width = ty.width();
    let len = array.dump_len();
    let element_address = |i: usize| (base > 0).then(|| base.wrapping_add((i * width) as u16));

    if !reports_pointer_table(len) {
        let data = read_bytes(packet, *heap, len)?;
        *heap += len;
        return (0..count)
            .map(|i| -> Result<_, CodecError> {
                Ok((element_address(i), decode_value(ty, data, i * width)?))
            })
            .collect();
    }

    let mut pointers = Vec::with_capacity(len / POINTER_CHUNK);
    let mut data = Vec::with_capacity(len);
    for _ in 0..len / POINTER_CHUNK {
        pointers.push(read_word(packet, *heap)?);
        data.extend_from_slice(read_bytes(packet, *heap + 2, POINTER_CHUNK)?);
        *heap += 2 + POINTER_CHUNK;
    }
    if ty != VarType::String {
        tracing::debug!(name = %array.name, len, "array reported as a pointer table");
    }
    (0..count)
        .map(|i| -> Result<_, CodecError> {
            let address = match ty {
                VarType::String => pointers.get(i).copied(),
                _ => element_address(i),
            };
            Ok((address, decode_value(ty, &data, i * width)?))
        })
        .collect()
}

fn parse(variable: &Variable, text: &str) -> Result<Value, BridgeError> {
    Value::parse(variable.var_type, text).map_err(|e| BridgeError::InvalidValue {
        name: variable.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastdbg_codec::{encode_float, encode_string};

    fn linked(mut v: Variable, address: u16) -> Variable {
        v.address = address;
        v
    }

    /// A (word @0x2000), B (float @0x2002), C (byte @0x2008),
    /// N$ (string slot @0x2009), D (3 words, slot @0x200B),
    /// BIG (large array, slot @0x200D), Z (unlinked word).
    fn table() -> VariableTable {
        VariableTable::new(vec![
            linked(Variable::scalar("N$", VarType::String), 0x2009),
            linked(Variable::scalar("B%", VarType::Float), 0x2002),
            linked(Variable::scalar("A", VarType::Word), 0x2000),
            linked(Variable::scalar("C", VarType::Byte), 0x2008),
            linked(Variable::array("D", VarType::Word, 3), 0x200B),
            linked(Variable::array("BIG", VarType::Byte, 300), 0x200D),
            Variable::scalar("Z", VarType::Word),
        ])
    }

    fn snapshot() -> Vec<u8> {
        let mut packet = vec![1, 0x24, 0x03];
        // Scalar block, 0x2000..0x2009
        packet.extend_from_slice(&[0x34, 0x12]);
        packet.extend_from_slice(&encode_float(12.34));
        packet.push(7);
        // Heap, in name order: A, B%, BIG, C, D, N$, Z
        packet.extend_from_slice(&[0x00, 0x60, 0xEE, 0xEE]);
        packet.extend_from_slice(&[0x00, 0x50, 1, 0, 2, 0, 3, 0]);
        packet.extend_from_slice(&[0x00, 0x40]);
        let mut buffer = Vec::new();
        encode_string("HELLO", &mut buffer);
        buffer.resize(256, 0);
        packet.extend_from_slice(&buffer);
        packet
    }

    #[test]
    fn sorted_by_name() {
        let table = table();
        let names: Vec<&str> = table.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B%", "BIG", "C", "D", "N$", "Z"]);
    }

    #[test]
    fn dump_request_spans_scalars() {
        let request = table().dump_request();
        assert_eq!(request.min_address, 0x2000);
        assert_eq!(request.scalar_len, 9);
        assert_eq!(request.regions, vec![(0x200D, 2), (0x200B, 6), (0x2009, 256)]);
    }

    #[test]
    fn empty_table_requests_nothing() {
        let request = VariableTable::new(Vec::new()).dump_request();
        assert_eq!(request, DumpRequest::default());
    }

    #[test]
    fn snapshot_updates_values_and_addresses() {
        let mut table = table();
        table.apply_snapshot(&snapshot()).unwrap();

        assert_eq!(table.find("A").unwrap().scalar_value(), Some(&Value::Word(0x1234)));
        assert_eq!(table.find("B").unwrap().scalar_value(), Some(&Value::Float(12.34)));
        assert_eq!(table.find("C").unwrap().scalar_value(), Some(&Value::Byte(7)));

        let name = table.find("N$").unwrap();
        assert_eq!(name.scalar_value(), Some(&Value::Str("HELLO".into())));
        assert_eq!(name.address, 0x4000);

        let big = table.find("BIG").unwrap();
        assert_eq!(big.address, 0x6000);

        let d = table.find("d").unwrap();
        assert_eq!(d.address, 0x5000);
        let elements = d.elements().unwrap();
        assert_eq!(elements[2].scalar_value(), Some(&Value::Word(3)));
        assert_eq!(elements[2].address, 0x5004);

        assert_eq!(table.find("Z").unwrap().scalar_value(), Some(&Value::Word(0)));
    }

    #[test]
    fn short_snapshot_is_an_error_and_keeps_previous_values() {
        let mut table = table();
        table.apply_snapshot(&snapshot()).unwrap();
        let before = table.variables().to_vec();

        // New scalar values, then the report stops inside N$'s buffer.
        let mut packet = snapshot();
        packet[3] = 0x99;
        packet.truncate(packet.len() - 100);

        let err = table.apply_snapshot(&packet).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
        assert_eq!(table.variables(), before.as_slice());
        assert_eq!(table.find("A").unwrap().scalar_value(), Some(&Value::Word(0x1234)));
    }

    #[test]
    fn short_array_data_is_an_error() {
        let mut table = table();
        let mut packet = snapshot();
        // Cut inside D's element data.
        packet.truncate(3 + 9 + 4 + 2 + 3);
        assert!(table.apply_snapshot(&packet).is_err());
        assert_eq!(table.find("D").unwrap().address, 0);
    }

    #[test]
    fn float_array_reported_in_chunks_keeps_later_variables_aligned() {
        // 128 floats make 768 bytes, which the target sends as three
        // pointer-led 256-byte chunks.
        let mut table = VariableTable::new(vec![
            linked(Variable::array("F%", VarType::Float, 128), 0x2000),
            linked(Variable::scalar("S$", VarType::String), 0x2002),
        ]);
        assert_eq!(table.dump_request().regions, vec![(0x2000, 768), (0x2002, 256)]);

        let mut packet = vec![1, 0x24, 0x03];
        packet.extend_from_slice(&[0x00, 0x50]);
        let mut data = Vec::new();
        for _ in 0..128 {
            data.extend_from_slice(&encode_float(1.5));
        }
        for chunk in data.chunks(256) {
            packet.extend_from_slice(&[0x00, 0x58]);
            packet.extend_from_slice(chunk);
        }
        packet.extend_from_slice(&[0x00, 0x60]);
        let mut buffer = Vec::new();
        encode_string("HELLO", &mut buffer);
        buffer.resize(256, 0);
        packet.extend_from_slice(&buffer);

        table.apply_snapshot(&packet).unwrap();

        let name = table.find("S$").unwrap();
        assert_eq!(name.address, 0x6000);
        assert_eq!(name.scalar_value(), Some(&Value::Str("HELLO".into())));

        let floats = table.find("F").unwrap();
        assert_eq!(floats.address, 0x5000);
        let elements = floats.elements().unwrap();
        assert_eq!(elements[127].scalar_value(), Some(&Value::Float(1.5)));
        assert_eq!(elements[1].address, 0x5006);
    }

    #[test]
    fn string_array_elements_carry_their_own_address() {
        let mut table =
            VariableTable::new(vec![linked(Variable::array("S$", VarType::String, 2), 0x2000)]);
        assert_eq!(table.dump_request().regions, vec![(0x2000, 512)]);

        let mut packet = vec![1, 0, 3, 0x00, 0x70];
        for (addr, text) in [(0x7100u16, "A"), (0x7200, "BC")] {
            packet.extend_from_slice(&addr.to_le_bytes());
            let mut buffer = Vec::new();
            encode_string(text, &mut buffer);
            buffer.resize(256, 0);
            packet.extend_from_slice(&buffer);
        }
        table.apply_snapshot(&packet).unwrap();

        let elements = table.find("S").unwrap().elements().unwrap();
        assert_eq!(elements[1].address, 0x7200);
        assert_eq!(elements[1].scalar_value(), Some(&Value::Str("BC".into())));
    }

    #[test]
    fn unmodified_table_has_no_writes() {
        let mut table = table();
        table.apply_snapshot(&snapshot()).unwrap();
        assert!(table.pending_writes().is_empty());
    }

    #[test]
    fn staged_edits_become_writes_until_cleared() {
        let mut table = table();
        table.apply_snapshot(&snapshot()).unwrap();
        table.set_variable("a", "$10").unwrap();
        table.set_variable("N", "'BYE'").unwrap();
        table.set_element("D", 1, "9").unwrap();

        let writes = table.pending_writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], VariableWrite::new(0x2000, &Value::Word(16)));
        assert_eq!(writes[1], VariableWrite::new(0x5002, &Value::Word(9)));
        assert_eq!(writes[2], VariableWrite::new(0x4000, &Value::Str("BYE".into())));

        table.clear_modified();
        assert!(table.pending_writes().is_empty());
    }

    #[test]
    fn edit_errors() {
        let mut table = table();
        assert!(matches!(
            table.set_variable("nope", "1"),
            Err(BridgeError::UnknownVariable { .. })
        ));
        assert!(matches!(
            table.set_variable("D", "1"),
            Err(BridgeError::ReadOnly { .. })
        ));
        assert!(matches!(
            table.set_element("BIG", 0, "1"),
            Err(BridgeError::ReadOnly { .. })
        ));
        assert!(matches!(
            table.set_element("D", 3, "1"),
            Err(BridgeError::UnknownVariable { .. })
        ));
        assert!(matches!(
            table.set_variable("A", "abc"),
            Err(BridgeError::InvalidValue { .. })
        ));
    }
}
