use atomicwrites::{AllowOverwrite, AtomicFile};
use std::{
    collections::{hash_map::DefaultHasher, BTreeMap, HashMap},
    fs::{self, File},
    hash::{Hash, Hasher},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

/// Nombre del archivo intermedio que produce la tarea map `map_seq` para la
/// partición `reduce_seq`.
pub fn intermediate_name(map_seq: usize, reduce_seq: usize) -> String {
    format!("mr-{}-{}", map_seq, reduce_seq)
}

pub fn output_name(reduce_seq: usize) -> String {
    format!("mr-out-{}", reduce_seq)
}

/// Partición de un archivo intermedio según su nombre (`mr-X-Y` -> Y).
fn partition_of(path: &str) -> Option<usize> {
    let name = Path::new(path).file_name()?.to_str()?;
    let mut parts = name.rsplit('-');
    let reduce = parts.next()?.parse().ok()?;
    let _map: usize = parts.next()?.parse().ok()?;
    if parts.next()? != "mr" {
        return None;
    }
    Some(reduce)
}

pub fn hash_key_to_partition(key: &str, num_partitions: usize) -> usize {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    (h.finish() % num_partitions as u64) as usize
}

/// Limpia un token: solo alfanumérico y '_', en minúscula.
fn clean_token(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Escribe "palabra,conteo" ordenado por palabra. Cada escritura usa su
/// propio temporal y termina en un rename, así dos workers que corren la
/// misma tarea no se pisan y un lector nunca ve un archivo a medias.
fn write_counts<'a, I>(path: &Path, entries: I) -> io::Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a u64)>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    AtomicFile::new(path, AllowOverwrite)
        .write(|f| {
            let mut writer = BufWriter::new(f);
            for (word, count) in entries {
                writeln!(writer, "{},{}", word, count)?;
            }
            writer.flush()
        })
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}

/// Fase map del WordCount: cuenta palabras de `input_path` y reparte el
/// resultado en `n_reduce` archivos intermedios dentro de `work_dir`.
/// Devuelve las rutas de todos los archivos generados (incluidos los vacíos).
pub fn map_file(
    input_path: &str,
    map_seq: usize,
    n_reduce: usize,
    work_dir: &Path,
) -> io::Result<Vec<String>> {
    if n_reduce == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "n_reduce debe ser mayor que cero",
        ));
    }

    let reader = BufReader::new(File::open(input_path)?);

    let mut buckets: Vec<HashMap<String, u64>> = vec![HashMap::new(); n_reduce];
    for line in reader.lines() {
        let line = line?;
        for token in line.split_whitespace().filter_map(clean_token) {
            let pid = hash_key_to_partition(&token, n_reduce);
            *buckets[pid].entry(token).or_insert(0) += 1;
        }
    }

    let mut outputs = Vec::with_capacity(n_reduce);
    for (reduce_seq, bucket) in buckets.into_iter().enumerate() {
        let path = work_dir.join(intermediate_name(map_seq, reduce_seq));
        let sorted: BTreeMap<String, u64> = bucket.into_iter().collect();
        write_counts(&path, sorted.iter())?;
        outputs.push(path.to_string_lossy().to_string());
    }

    Ok(outputs)
}

/// Fase reduce del WordCount: suma los conteos de los archivos intermedios de
/// la partición `reduce_seq` y escribe `mr-out-<reduce_seq>` en `work_dir`.
/// Los archivos de otras particiones se ignoran.
pub fn reduce_files(inputs: &[String], reduce_seq: usize, work_dir: &Path) -> io::Result<String> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();

    for input in inputs
        .iter()
        .filter(|p| partition_of(p) == Some(reduce_seq))
    {
        let reader = BufReader::new(File::open(input)?);
        for line in reader.lines() {
            let line = line?;
            let Some((word, count)) = line.rsplit_once(',') else {
                continue;
            };
            let count: u64 = count.trim().parse().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("conteo inválido en {}: {}", input, e),
                )
            })?;
            *counts.entry(word.to_string()).or_insert(0) += count;
        }
    }

    let path = work_dir.join(output_name(reduce_seq));
    write_counts(&path, counts.iter())?;
    Ok(path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("wordcount_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn read_sorted_lines(path: &str) -> Vec<String> {
        let content = fs::read_to_string(path).unwrap();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        lines.sort();
        lines
    }

    #[test]
    fn map_then_reduce_counts_words_across_files() {
        let tmp = temp_dir("end_to_end");
        let a = tmp.join("a.txt");
        let b = tmp.join("b.txt");
        fs::write(&a, "Hola hola, mundo!!\n").unwrap();
        fs::write(&b, "mundo   mundo_prueba\n").unwrap();

        let mut intermediate = Vec::new();
        intermediate.extend(map_file(a.to_str().unwrap(), 0, 2, &tmp).unwrap());
        intermediate.extend(map_file(b.to_str().unwrap(), 1, 2, &tmp).unwrap());
        assert_eq!(intermediate.len(), 4);

        let mut lines = Vec::new();
        for r in 0..2 {
            let out = reduce_files(&intermediate, r, &tmp).unwrap();
            assert!(out.ends_with(&output_name(r)));
            lines.extend(read_sorted_lines(&out));
        }
        lines.sort();

        assert_eq!(lines, vec!["hola,2", "mundo,2", "mundo_prueba,1"]);
    }

    #[test]
    fn map_file_writes_every_partition_even_if_empty() {
        let tmp = temp_dir("empty_partitions");
        let input = tmp.join("input.txt");
        fs::write(&input, "").unwrap();

        let outputs = map_file(input.to_str().unwrap(), 7, 3, &tmp).unwrap();

        assert_eq!(outputs.len(), 3);
        for (r, out) in outputs.iter().enumerate() {
            assert!(out.ends_with(&intermediate_name(7, r)));
            assert!(fs::read_to_string(out).unwrap().is_empty());
        }
    }

    #[test]
    fn concurrent_runs_of_same_map_task_both_succeed() {
        let tmp = temp_dir("concurrent_map");
        let input = tmp.join("input.txt");
        fs::write(&input, "uno dos dos tres tres tres\n").unwrap();
        let input = input.to_string_lossy().to_string();

        for _ in 0..20 {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let input = input.clone();
                    let dir = tmp.clone();
                    std::thread::spawn(move || map_file(&input, 0, 1, &dir))
                })
                .collect();

            for h in handles {
                let outputs = h.join().unwrap().unwrap();
                assert_eq!(outputs.len(), 1);
            }

            let lines = read_sorted_lines(tmp.join(intermediate_name(0, 0)).to_str().unwrap());
            assert_eq!(lines, vec!["dos,2", "tres,3", "uno,1"]);
        }
    }

    #[test]
    fn map_file_returns_error_when_input_missing() {
        let tmp = temp_dir("missing");
        let input = tmp.join("no_existe.txt");

        let res = map_file(input.to_str().unwrap(), 0, 2, &tmp);

        assert!(res.is_err());
        assert!(!tmp.join(intermediate_name(0, 0)).exists());
    }

    #[test]
    fn reduce_ignores_files_from_other_partitions() {
        let tmp = temp_dir("other_partitions");
        let p0 = tmp.join(intermediate_name(0, 0));
        let p1 = tmp.join(intermediate_name(0, 1));
        let p11 = tmp.join(intermediate_name(0, 11));
        fs::write(&p0, "a,1\n").unwrap();
        fs::write(&p1, "b,5\n").unwrap();
        fs::write(&p11, "c,9\n").unwrap();

        let inputs: Vec<String> = [p0, p1, p11]
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        let out = reduce_files(&inputs, 1, &tmp).unwrap();

        assert_eq!(read_sorted_lines(&out), vec!["b,5"]);
    }

    #[test]
    fn partition_of_parses_intermediate_names_only() {
        assert_eq!(partition_of("/tmp/x/mr-3-4"), Some(4));
        assert_eq!(partition_of("mr-0-12"), Some(12));
        assert_eq!(partition_of("mr-out-1"), None);
        assert_eq!(partition_of("part-1"), None);
    }

    #[test]
    fn hash_partition_is_stable_and_in_range() {
        for n in 1..8 {
            let p = hash_key_to_partition("mundo", n);
            assert!(p < n);
            assert_eq!(p, hash_key_to_partition("mundo", n));
        }
    }
}
